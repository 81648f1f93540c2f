use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gauge_worker::{TaskClass, spawn_blocking};
use serde_json::Value;

use crate::{Result, SharedStore, StoreError};

/// Directory-backed store with one JSON document per key.
///
/// Writes land in a uniquely named temp file that is renamed over the target,
/// so concurrent readers in other processes see either the old or the new
/// document, never a torn one. Concurrent writers race; the last rename wins.
#[derive(Debug, Clone)]
pub struct FileStore {
	dir: PathBuf,
}

impl FileStore {
	/// Opens (creating if needed) a store rooted at `dir`.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
		let dir = dir.into();
		std::fs::create_dir_all(&dir).map_err(|error| StoreError::Io { path: dir.clone(), error })?;
		Ok(Self { dir })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn path_for(&self, key: &str) -> PathBuf {
		self.dir.join(format!("{}.json", file_stem(key)))
	}
}

/// Maps a key onto a portable file stem.
fn file_stem(key: &str) -> String {
	key.chars()
		.map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
		.collect()
}

fn read_value(key: &str, path: &Path) -> Result<Option<Value>> {
	let bytes = match std::fs::read(path) {
		Ok(bytes) => bytes,
		Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
		Err(error) => return Err(StoreError::Io { path: path.to_path_buf(), error }),
	};
	serde_json::from_slice(&bytes)
		.map(Some)
		.map_err(|error| StoreError::Serde { key: key.to_string(), error })
}

fn write_value(key: &str, path: &Path, value: &Value) -> Result<()> {
	let bytes = serde_json::to_vec_pretty(value).map_err(|error| StoreError::Serde { key: key.to_string(), error })?;
	let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), uuid::Uuid::new_v4().simple()));
	std::fs::write(&tmp, bytes).map_err(|error| StoreError::Io { path: tmp.clone(), error })?;
	if let Err(error) = std::fs::rename(&tmp, path) {
		let _ = std::fs::remove_file(&tmp);
		return Err(StoreError::Io { path: path.to_path_buf(), error });
	}
	Ok(())
}

#[async_trait]
impl SharedStore for FileStore {
	async fn get(&self, key: &str) -> Result<Option<Value>> {
		let path = self.path_for(key);
		let key = key.to_string();
		spawn_blocking(TaskClass::IoBlocking, move || read_value(&key, &path))
			.await
			.map_err(|e| StoreError::Join(e.to_string()))?
	}

	async fn set(&self, key: &str, value: Value) -> Result<()> {
		let path = self.path_for(key);
		let key = key.to_string();
		tracing::trace!(key = %key, path = %path.display(), "store.file.write");
		spawn_blocking(TaskClass::IoBlocking, move || write_value(&key, &path, &value))
			.await
			.map_err(|e| StoreError::Join(e.to_string()))?
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn keys_map_to_safe_file_names() {
		assert_eq!(file_stem("deepseek.statusData"), "deepseek.statusData");
		assert_eq!(file_stem("a/b:c d"), "a_b_c_d");
	}

	#[tokio::test(flavor = "current_thread")]
	async fn values_survive_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::open(dir.path()).unwrap();
		store.set("gauge.leader.lease", json!({"ownerId": "p1"})).await.unwrap();

		let reopened = FileStore::open(dir.path()).unwrap();
		assert_eq!(reopened.get("gauge.leader.lease").await.unwrap(), Some(json!({"ownerId": "p1"})));
		assert_eq!(reopened.get("missing").await.unwrap(), None);
	}

	#[tokio::test(flavor = "current_thread")]
	async fn overwrite_leaves_no_temp_files() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::open(dir.path()).unwrap();
		store.set("k", json!(1)).await.unwrap();
		store.set("k", json!(2)).await.unwrap();

		assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
		let names: Vec<_> = std::fs::read_dir(dir.path())
			.unwrap()
			.map(|e| e.unwrap().file_name().into_string().unwrap())
			.collect();
		assert_eq!(names, vec!["k.json".to_string()]);
	}

	#[tokio::test(flavor = "current_thread")]
	async fn corrupt_document_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::open(dir.path()).unwrap();
		std::fs::write(dir.path().join("k.json"), b"{not json").unwrap();
		assert!(matches!(store.get("k").await, Err(StoreError::Serde { .. })));
	}
}
