use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::{Result, SharedStore};

/// In-process store.
///
/// Clones share the same map, so handing clones to several services models
/// several processes pointed at one backing store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
	inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Removes `key`, returning the previous value.
	pub fn remove(&self, key: &str) -> Option<Value> {
		self.inner.write().remove(key)
	}
}

#[async_trait]
impl SharedStore for MemoryStore {
	async fn get(&self, key: &str) -> Result<Option<Value>> {
		Ok(self.inner.read().get(key).cloned())
	}

	async fn set(&self, key: &str, value: Value) -> Result<()> {
		self.inner.write().insert(key.to_string(), value);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::SharedStoreExt;

	#[tokio::test(flavor = "current_thread")]
	async fn clones_share_state() {
		let a = MemoryStore::new();
		let b = a.clone();
		a.set("k", json!({"n": 1})).await.unwrap();
		assert_eq!(b.get("k").await.unwrap(), Some(json!({"n": 1})));

		b.set("k", json!({"n": 2})).await.unwrap();
		assert_eq!(a.get("k").await.unwrap(), Some(json!({"n": 2})));
	}

	#[tokio::test(flavor = "current_thread")]
	async fn typed_get_reports_shape_mismatch() {
		let store = MemoryStore::new();
		store.set("k", json!("not a number")).await.unwrap();
		let err = store.get_json::<u64>("k").await.unwrap_err();
		assert!(matches!(err, crate::StoreError::Serde { ref key, .. } if key == "k"));
	}

	#[tokio::test(flavor = "current_thread")]
	async fn missing_key_is_none() {
		let store = MemoryStore::new();
		assert_eq!(store.get_json::<u64>("absent").await.unwrap(), None);
		store.set_json("present", &7u64).await.unwrap();
		assert_eq!(store.remove("present"), Some(json!(7)));
	}
}
