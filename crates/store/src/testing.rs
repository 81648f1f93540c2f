//! Store doubles for exercising coordination failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::{MemoryStore, Result, SharedStore, StoreError};

/// [`MemoryStore`] wrapper that can be switched into a failing mode and
/// counts operations.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
	inner: MemoryStore,
	failing: Arc<AtomicBool>,
	reads: Arc<AtomicUsize>,
	writes: Arc<AtomicUsize>,
}

impl FlakyStore {
	pub fn new(inner: MemoryStore) -> Self {
		Self {
			inner,
			..Self::default()
		}
	}

	/// Makes every subsequent operation fail (or succeed again).
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	pub fn reads(&self) -> usize {
		self.reads.load(Ordering::SeqCst)
	}

	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	pub fn inner(&self) -> &MemoryStore {
		&self.inner
	}

	fn check(&self) -> Result<()> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(StoreError::Unavailable("injected failure".into()));
		}
		Ok(())
	}
}

#[async_trait]
impl SharedStore for FlakyStore {
	async fn get(&self, key: &str) -> Result<Option<Value>> {
		self.reads.fetch_add(1, Ordering::SeqCst);
		self.check()?;
		self.inner.get(key).await
	}

	async fn set(&self, key: &str, value: Value) -> Result<()> {
		self.writes.fetch_add(1, Ordering::SeqCst);
		self.check()?;
		self.inner.set(key, value).await
	}
}
