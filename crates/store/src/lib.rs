//! Persistent store shared by every cooperating gauge process.
//!
//! # Mental model
//!
//! - A flat key/value namespace of JSON documents, durable across restarts.
//! - Every process reads and writes the same keys; last write wins per key.
//! - There is no compare-and-swap. Coordination protocols built on top (see
//!   `gauge-lease`) confirm their writes by reading them back.
//!
//! Two backends ship here: [`MemoryStore`] for a single process (and for tests
//! simulating several processes through shared clones) and [`FileStore`], one
//! JSON file per key in a directory all processes can reach.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

mod error;
mod file;
mod memory;
pub mod testing;

pub use error::{Result, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Key/value store shared across processes.
#[async_trait]
pub trait SharedStore: Send + Sync + fmt::Debug {
	/// Returns the value stored under `key`, if any.
	async fn get(&self, key: &str) -> Result<Option<Value>>;

	/// Replaces the value stored under `key`.
	async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Typed access on top of [`SharedStore`].
#[async_trait]
pub trait SharedStoreExt: SharedStore {
	/// Reads and decodes `key`.
	async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
	where
		T: DeserializeOwned + Send,
	{
		match self.get(key).await? {
			Some(value) => serde_json::from_value(value).map(Some).map_err(|error| StoreError::Serde { key: key.to_string(), error }),
			None => Ok(None),
		}
	}

	/// Encodes and writes `value` under `key`.
	async fn set_json<T>(&self, key: &str, value: &T) -> Result<()>
	where
		T: Serialize + Sync,
	{
		let value = serde_json::to_value(value).map_err(|error| StoreError::Serde { key: key.to_string(), error })?;
		self.set(key, value).await
	}
}

impl<S: SharedStore + ?Sized> SharedStoreExt for S {}
