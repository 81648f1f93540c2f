//! Process-wide collection of status engines.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use gauge_worker::TaskClass;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::REFRESH_COMMAND_PREFIX;
use crate::{EngineContext, EngineLifecycleState, RefreshOutcome, Result, StatusEngine, StatusEntity, StatusError};


/// Lifecycle surface shared by every engine regardless of its entity type.
#[async_trait]
pub trait StatusItem: Send + Sync {
	fn id(&self) -> &str;
	fn lifecycle(&self) -> EngineLifecycleState;
	async fn initialize(&self, ctx: EngineContext) -> Result<()>;
	async fn check_and_show_status(&self) -> bool;
	fn delayed_update(&self, delay: Duration);
	async fn refresh(&self) -> RefreshOutcome;
	fn dispose(&self);
}

#[async_trait]
impl<E: StatusEntity> StatusItem for StatusEngine<E> {
	fn id(&self) -> &str {
		StatusEngine::id(self)
	}

	fn lifecycle(&self) -> EngineLifecycleState {
		StatusEngine::lifecycle(self)
	}

	async fn initialize(&self, ctx: EngineContext) -> Result<()> {
		StatusEngine::initialize(self, ctx).await
	}

	async fn check_and_show_status(&self) -> bool {
		StatusEngine::check_and_show_status(self).await
	}

	fn delayed_update(&self, delay: Duration) {
		StatusEngine::delayed_update(self, delay);
	}

	async fn refresh(&self) -> RefreshOutcome {
		StatusEngine::refresh(self).await
	}

	fn dispose(&self) {
		StatusEngine::dispose(self);
	}
}

/// Outcome of [`StatusRegistry::initialize_all`].
#[derive(Debug, Default)]
pub struct InitReport {
	pub initialized: Vec<String>,
	pub failed: Vec<(String, StatusError)>,
}

impl InitReport {
	pub fn is_complete(&self) -> bool {
		self.failed.is_empty()
	}
}

/// Owns every engine in the process, keyed by entity id.
///
/// Operations addressed to an unknown id are logged and ignored. One engine
/// failing never stops the others.
#[derive(Default)]
pub struct StatusRegistry {
	items: RwLock<BTreeMap<String, Arc<dyn StatusItem>>>,
}

impl std::fmt::Debug for StatusRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StatusRegistry").field("ids", &self.ids()).finish()
	}
}

impl StatusRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, item: Arc<dyn StatusItem>) -> Result<()> {
		let id = item.id().to_string();
		let mut items = self.items.write();
		if items.contains_key(&id) {
			return Err(StatusError::Duplicate(id));
		}
		debug!(entity = %id, "status.registry.register");
		items.insert(id, item);
		Ok(())
	}

	pub fn get(&self, id: &str) -> Option<Arc<dyn StatusItem>> {
		self.items.read().get(id).cloned()
	}

	/// Registered ids in sorted order.
	pub fn ids(&self) -> Vec<String> {
		self.items.read().keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.items.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.read().is_empty()
	}

	/// Registers `items`, then initializes every registered engine that has not
	/// been initialized yet, concurrently.
	pub async fn initialize_all(
		&self,
		items: impl IntoIterator<Item = Arc<dyn StatusItem>>,
		ctx: &EngineContext,
	) -> InitReport {
		let mut report = InitReport::default();
		for item in items {
			let id = item.id().to_string();
			if let Err(error) = self.register(item) {
				warn!(entity = %id, %error, "status.registry.rejected");
				report.failed.push((id, error));
			}
		}

		let pending: Vec<_> = self
			.items
			.read()
			.values()
			.filter(|item| item.lifecycle() == EngineLifecycleState::Uninitialized)
			.cloned()
			.collect();

		let outcomes = join_all(pending.into_iter().map(|item| {
			let ctx = ctx.clone();
			async move {
				let outcome = AssertUnwindSafe(item.initialize(ctx)).catch_unwind().await;
				(item.id().to_string(), outcome)
			}
		}))
		.await;

		for (id, outcome) in outcomes {
			match outcome {
				Ok(Ok(())) => report.initialized.push(id),
				Ok(Err(error)) => {
					warn!(entity = %id, %error, "status.registry.init_failed");
					report.failed.push((id, error));
				}
				Err(_) => {
					warn!(entity = %id, "status.registry.init_panicked");
					report.failed.push((id.clone(), StatusError::Panicked(id)));
				}
			}
		}
		info!(
			initialized = report.initialized.len(),
			failed = report.failed.len(),
			"status.registry.initialized"
		);
		report
	}

	/// Returns the entity's visibility, or `None` if `id` is unknown.
	pub async fn check_and_show_status(&self, id: &str) -> Option<bool> {
		let item = self.lookup(id)?;
		Some(item.check_and_show_status().await)
	}

	/// Re-evaluates visibility of every entity, e.g. after credentials change.
	pub async fn check_and_show_all(&self) {
		let items: Vec<_> = self.items.read().values().cloned().collect();
		join_all(items.iter().map(|item| item.check_and_show_status())).await;
	}

	/// Returns false if `id` is unknown.
	pub fn delayed_update(&self, id: &str, delay: Duration) -> bool {
		match self.lookup(id) {
			Some(item) => {
				item.delayed_update(delay);
				true
			}
			None => false,
		}
	}

	/// Manual refresh of one entity.
	pub async fn refresh(&self, id: &str) -> Option<RefreshOutcome> {
		let item = self.lookup(id)?;
		Some(item.refresh().await)
	}

	/// Dispatches a widget command such as `gauge.refresh.<id>`.
	///
	/// The refresh runs in the background; returns false for commands this
	/// registry does not own.
	pub fn handle_command(&self, command: &str) -> bool {
		let Some(id) = command.strip_prefix(REFRESH_COMMAND_PREFIX) else {
			return false;
		};
		let Some(item) = self.lookup(id) else {
			return false;
		};
		gauge_worker::spawn(TaskClass::Interactive, async move {
			let outcome = item.refresh().await;
			debug!(entity = item.id(), ?outcome, "status.registry.command");
		});
		true
	}

	/// Disposes and forgets every engine. Safe after a partial initialization
	/// and on repeated calls.
	pub fn dispose_all(&self) {
		let items = std::mem::take(&mut *self.items.write());
		for item in items.values() {
			item.dispose();
		}
		if !items.is_empty() {
			info!(count = items.len(), "status.registry.disposed");
		}
	}

	fn lookup(&self, id: &str) -> Option<Arc<dyn StatusItem>> {
		let item = self.get(id);
		if item.is_none() {
			warn!(entity = id, "status.registry.missing");
		}
		item
	}
}
