//! Per-entity cache, refresh scheduling and widget updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use gauge_lease::{LeaderElection, PeriodicTask, TaskId};
use gauge_store::{SharedStore, SharedStoreExt};
use gauge_worker::{ScheduledTask, SharedClock, TaskClass, timer};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::cache::SnapshotAge;
use crate::{CachedStatus, EngineConfig, Result, StatusEntity, StatusError, StatusWidget, WidgetHost};


/// Delay used by callers that have no better idea.
pub const DEFAULT_UPDATE_DELAY: Duration = Duration::from_secs(2);

/// Shown in place of data after a failed manual refresh.
pub const ERROR_GLYPH: &str = "⚠";

const ERROR_DETAIL_LIMIT: usize = 200;

/// Process-wide collaborators handed to every engine at initialization.
#[derive(Clone)]
pub struct EngineContext {
	pub store: Arc<dyn SharedStore>,
	pub election: LeaderElection,
	pub widgets: Arc<dyn WidgetHost>,
	pub clock: SharedClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineLifecycleState {
	#[default]
	Uninitialized,
	Initializing,
	Active,
	Disposed,
}

/// Result of one [`StatusEngine::execute_api_query`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// The query succeeded and the cache, store and widget were updated.
	Updated,
	/// The query failed with this message.
	Failed(String),
	/// No query was issued.
	Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	/// The engine is not active, or was disposed while the query was in flight.
	Inactive,
	/// Another query for this entity is in flight.
	InFlight,
	/// Automatic refresh with a cache younger than the fresh threshold.
	Fresh,
}

/// Result of one cache poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAdoption {
	Adopted,
	/// The snapshot is not newer than what is already in memory.
	NotNewer,
	Expired,
	Missing,
	Unreadable,
	Inactive,
}

struct Binding {
	store: Arc<dyn SharedStore>,
	clock: SharedClock,
	election: LeaderElection,
	widget: Arc<dyn StatusWidget>,
}

#[derive(Default)]
struct Timers {
	cache_poll: Option<ScheduledTask>,
	leader_task: Option<TaskId>,
	delayed: Option<ScheduledTask>,
	/// Bumped on every schedule so a firing timer only clears its own slot.
	delayed_generation: u64,
	last_delayed: Option<Instant>,
}

struct Inner<E: StatusEntity> {
	config: EngineConfig,
	entity: E,
	lifecycle: Mutex<EngineLifecycleState>,
	binding: Mutex<Option<Arc<Binding>>>,
	cache: Mutex<Option<CachedStatus<E::Data>>>,
	timers: Mutex<Timers>,
	querying: AtomicBool,
	visible: AtomicBool,
}

/// Generic status engine driving one [`StatusEntity`].
///
/// Owns the entity's in-memory [`CachedStatus`], mirrors it to the shared
/// store under [`EngineConfig::cache_key`], and pushes presentation changes to
/// a [`StatusWidget`]. Refreshes come from four places:
///
/// - once at [`initialize`](Self::initialize) and on [`check_and_show_status`](Self::check_and_show_status),
/// - debounced [`delayed_update`](Self::delayed_update) calls,
/// - a periodic task run only while this process leads,
/// - [`refresh`](Self::refresh), the user's manual trigger.
///
/// Followers stay current through the cache poll, which adopts snapshots the
/// leader persisted without issuing a query.
pub struct StatusEngine<E: StatusEntity> {
	inner: Arc<Inner<E>>,
}

impl<E: StatusEntity> Clone for StatusEngine<E> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<E: StatusEntity> std::fmt::Debug for StatusEngine<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StatusEngine")
			.field("id", &self.inner.config.id)
			.field("lifecycle", &*self.inner.lifecycle.lock())
			.field("visible", &self.inner.visible.load(Ordering::Relaxed))
			.finish()
	}
}

/// Clears the in-flight flag on every exit path, unwinding included.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

impl<E: StatusEntity> StatusEngine<E> {
	pub fn new(config: EngineConfig, entity: E) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			inner: Arc::new(Inner {
				config,
				entity,
				lifecycle: Mutex::new(EngineLifecycleState::Uninitialized),
				binding: Mutex::new(None),
				cache: Mutex::new(None),
				timers: Mutex::new(Timers::default()),
				querying: AtomicBool::new(false),
				visible: AtomicBool::new(false),
			}),
		})
	}

	pub fn id(&self) -> &str {
		&self.inner.config.id
	}

	pub fn config(&self) -> &EngineConfig {
		&self.inner.config
	}

	pub fn entity(&self) -> &E {
		&self.inner.entity
	}

	pub fn lifecycle(&self) -> EngineLifecycleState {
		*self.inner.lifecycle.lock()
	}

	pub fn is_visible(&self) -> bool {
		self.inner.visible.load(Ordering::Acquire)
	}

	/// Current in-memory snapshot.
	pub fn cached(&self) -> Option<CachedStatus<E::Data>> {
		self.inner.cache.lock().clone()
	}

	/// Binds the engine to `ctx` and starts its background work.
	///
	/// Seeds the cache from the shared store, creates and shows (or hides) the
	/// widget, starts the cache poll, registers the leader refresh check, then
	/// kicks off one background refresh. Repeated calls only warn.
	pub async fn initialize(&self, ctx: EngineContext) -> Result<()> {
		{
			let mut lifecycle = self.inner.lifecycle.lock();
			match *lifecycle {
				EngineLifecycleState::Uninitialized => *lifecycle = EngineLifecycleState::Initializing,
				EngineLifecycleState::Disposed => return Err(StatusError::Disposed(self.id().to_string())),
				EngineLifecycleState::Initializing | EngineLifecycleState::Active => {
					warn!(entity = self.id(), "status.initialize.repeated");
					return Ok(());
				}
			}
		}

		let config = &self.inner.config;
		let widget = ctx.widgets.create_widget(&config.id, &config.refresh_command(), config.priority);
		let binding = Arc::new(Binding {
			store: ctx.store,
			clock: ctx.clock,
			election: ctx.election,
			widget,
		});
		*self.inner.binding.lock() = Some(Arc::clone(&binding));

		self.seed_from_store(&binding).await;

		{
			let mut lifecycle = self.inner.lifecycle.lock();
			if *lifecycle != EngineLifecycleState::Initializing {
				debug!(entity = self.id(), "status.initialize.aborted");
				return Err(StatusError::Disposed(self.id().to_string()));
			}
			self.start_background_work(&binding);
			*lifecycle = EngineLifecycleState::Active;
		}

		let visible = self.apply_visibility(&binding);
		info!(entity = self.id(), visible, "status.initialized");

		if visible {
			let engine = Arc::downgrade(&self.inner);
			gauge_worker::spawn(TaskClass::Background, async move {
				if let Some(inner) = engine.upgrade() {
					StatusEngine { inner }.execute_api_query(false).await;
				}
			});
		}
		Ok(())
	}

	/// Re-evaluates visibility; refreshes immediately if the item is shown.
	///
	/// Returns whether the item is visible.
	pub async fn check_and_show_status(&self) -> bool {
		let Some(binding) = self.active_binding() else {
			debug!(entity = self.id(), "status.check.inactive");
			return false;
		};
		let visible = self.apply_visibility(&binding);
		if visible {
			self.execute_api_query(false).await;
		}
		visible
	}

	/// Schedules an automatic refresh after `delay`.
	///
	/// A pending delayed refresh is replaced, not queued. The effective delay
	/// is stretched so two delayed refreshes never fire closer together than
	/// [`EngineConfig::min_delayed_update_interval`].
	pub fn delayed_update(&self, delay: Duration) {
		if self.lifecycle() != EngineLifecycleState::Active {
			debug!(entity = self.id(), "status.delayed_update.inactive");
			return;
		}

		let min_interval = self.inner.config.min_delayed_update_interval;
		let mut timers = self.inner.timers.lock();
		let wait = debounce_wait(delay, timers.last_delayed, min_interval, Instant::now());

		if let Some(pending) = timers.delayed.take() {
			pending.cancel();
			trace!(entity = self.id(), "status.delayed_update.superseded");
		}

		timers.delayed_generation = timers.delayed_generation.wrapping_add(1);
		let generation = timers.delayed_generation;
		let engine = Arc::downgrade(&self.inner);
		let name = format!("status.delayed.{}", self.id());
		timers.delayed = Some(timer::after(TaskClass::Background, name, wait, async move {
			if let Some(inner) = engine.upgrade() {
				StatusEngine { inner }.run_delayed_update(generation).await;
			}
		}));
		debug!(
			entity = self.id(),
			requested_ms = delay.as_millis() as u64,
			wait_ms = wait.as_millis() as u64,
			"status.delayed_update"
		);
	}

	/// User-triggered refresh. Ignores the fresh threshold and surfaces failures.
	pub async fn refresh(&self) -> RefreshOutcome {
		self.execute_api_query(true).await
	}

	/// Cancels timers, releases the widget and clears the cache. Idempotent.
	pub fn dispose(&self) {
		{
			let mut lifecycle = self.inner.lifecycle.lock();
			if *lifecycle == EngineLifecycleState::Disposed {
				return;
			}
			*lifecycle = EngineLifecycleState::Disposed;
		}

		let binding = self.inner.binding.lock().take();
		let timers = std::mem::take(&mut *self.inner.timers.lock());
		if let Some(poll) = &timers.cache_poll {
			poll.cancel();
		}
		if let Some(delayed) = &timers.delayed {
			delayed.cancel();
		}
		if let Some(binding) = binding {
			if let Some(task) = timers.leader_task {
				binding.election.unregister_periodic_task(task);
			}
			binding.widget.hide();
			binding.widget.dispose();
		}
		*self.inner.cache.lock() = None;
		self.inner.visible.store(false, Ordering::Release);
		info!(entity = self.id(), "status.disposed");
	}

	/// Queries the entity and applies the result.
	///
	/// At most one query per entity is in flight. Automatic refreshes
	/// (`is_manual == false`) are skipped while the cache is fresh and never
	/// touch the widget on failure; manual refreshes always query and show
	/// failures. Results arriving after [`dispose`](Self::dispose) are dropped.
	pub async fn execute_api_query(&self, is_manual: bool) -> RefreshOutcome {
		let Some(binding) = self.active_binding() else {
			return RefreshOutcome::Skipped(SkipReason::Inactive);
		};
		if self
			.inner
			.querying
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			debug!(entity = self.id(), is_manual, "status.query.in_flight");
			return RefreshOutcome::Skipped(SkipReason::InFlight);
		}
		let _in_flight = InFlight(&self.inner.querying);

		let fresh_threshold = self.inner.config.fresh_threshold;
		let now = binding.clock.now();
		let fresh = self.inner.cache.lock().as_ref().is_some_and(|cached| cached.age(now) < fresh_threshold);
		if !is_manual && fresh {
			trace!(entity = self.id(), "status.query.fresh");
			return RefreshOutcome::Skipped(SkipReason::Fresh);
		}

		debug!(entity = self.id(), is_manual, "status.query");
		let result = self.inner.entity.perform_api_query().await.into_result();

		if !self.is_active() {
			debug!(entity = self.id(), "status.query.discarded");
			return RefreshOutcome::Skipped(SkipReason::Inactive);
		}

		match result {
			Ok(data) => {
				let completed = binding.clock.now();
				let snapshot = {
					let mut cache = self.inner.cache.lock();
					let timestamp = cache.as_ref().map_or(completed, |previous| previous.timestamp.max(completed));
					let snapshot = CachedStatus::new(data, timestamp);
					*cache = Some(snapshot.clone());
					snapshot
				};

				let key = self.inner.config.cache_key();
				if let Err(error) = binding.store.set_json(&key, &snapshot).await {
					warn!(entity = self.id(), %error, "status.persist_failed");
				}

				if self.is_active() {
					self.render(&binding, &snapshot);
				}
				RefreshOutcome::Updated
			}
			Err(error) => {
				if is_manual {
					warn!(entity = self.id(), %error, "status.query.failed");
					self.render_error(&binding, &error);
				} else {
					debug!(entity = self.id(), %error, "status.query.failed");
				}
				RefreshOutcome::Failed(error)
			}
		}
	}

	/// Adopts the persisted snapshot if it is recent enough and newer than memory.
	pub async fn update_from_cache(&self) -> CacheAdoption {
		let Some(binding) = self.active_binding() else {
			return CacheAdoption::Inactive;
		};

		let key = self.inner.config.cache_key();
		let snapshot = match binding.store.get_json::<CachedStatus<E::Data>>(&key).await {
			Ok(Some(snapshot)) => snapshot,
			Ok(None) => return CacheAdoption::Missing,
			Err(error) => {
				debug!(entity = self.id(), %error, "status.cache.unreadable");
				return CacheAdoption::Unreadable;
			}
		};

		let age = snapshot.age(binding.clock.now());
		match SnapshotAge::classify(age, &self.inner.config) {
			SnapshotAge::Recent => {}
			SnapshotAge::Stale => debug!(entity = self.id(), age_secs = age.as_secs(), "status.cache.stale"),
			SnapshotAge::Expired => {
				trace!(entity = self.id(), age_secs = age.as_secs(), "status.cache.expired");
				return CacheAdoption::Expired;
			}
		}

		if !self.is_active() {
			return CacheAdoption::Inactive;
		}
		{
			let mut cache = self.inner.cache.lock();
			if cache.as_ref().is_some_and(|current| current.timestamp >= snapshot.timestamp) {
				return CacheAdoption::NotNewer;
			}
			*cache = Some(snapshot.clone());
		}
		trace!(entity = self.id(), age_secs = age.as_secs(), "status.cache.adopted");
		self.render(&binding, &snapshot);
		CacheAdoption::Adopted
	}

	fn is_active(&self) -> bool {
		*self.inner.lifecycle.lock() == EngineLifecycleState::Active
	}

	fn active_binding(&self) -> Option<Arc<Binding>> {
		if !self.is_active() {
			return None;
		}
		self.inner.binding.lock().clone()
	}

	async fn seed_from_store(&self, binding: &Binding) {
		let key = self.inner.config.cache_key();
		match binding.store.get_json::<CachedStatus<E::Data>>(&key).await {
			Ok(Some(snapshot)) => {
				debug!(entity = self.id(), timestamp = %snapshot.timestamp, "status.cache.seeded");
				let mut cache = self.inner.cache.lock();
				if cache.as_ref().is_none_or(|current| current.timestamp < snapshot.timestamp) {
					*cache = Some(snapshot);
				}
			}
			Ok(None) => {}
			Err(error) => debug!(entity = self.id(), %error, "status.cache.unreadable"),
		}
	}

	fn start_background_work(&self, binding: &Binding) {
		let weak = Arc::downgrade(&self.inner);
		let poll = timer::every(
			TaskClass::Background,
			format!("status.cache_poll.{}", self.id()),
			self.inner.config.cache_check_interval,
			move || {
				let weak = weak.clone();
				async move {
					if let Some(inner) = weak.upgrade() {
						StatusEngine { inner }.update_from_cache().await;
					}
				}
			},
		);

		let task = binding.election.register_periodic_task(Arc::new(RefreshCheck {
			name: format!("status.refresh.{}", self.id()),
			engine: Arc::downgrade(&self.inner),
		}));

		let mut timers = self.inner.timers.lock();
		timers.cache_poll = Some(poll);
		timers.leader_task = Some(task);
	}

	fn apply_visibility(&self, binding: &Binding) -> bool {
		let visible = self.inner.entity.should_show_status_bar();
		let was = self.inner.visible.swap(visible, Ordering::AcqRel);
		if visible {
			match self.cached() {
				Some(snapshot) => self.render(binding, &snapshot),
				None => self.render_loading(binding),
			}
			binding.widget.show();
		} else {
			binding.widget.hide();
		}
		if was != visible {
			debug!(entity = self.id(), visible, "status.visibility");
		}
		visible
	}

	async fn run_delayed_update(&self, generation: u64) {
		{
			let mut timers = self.inner.timers.lock();
			timers.last_delayed = Some(Instant::now());
			if timers.delayed_generation == generation {
				timers.delayed = None;
			}
		}
		self.execute_api_query(false).await;
	}

	/// Leader-only: refresh if the entity says the cache is due.
	fn leader_round(&self) {
		let Some(binding) = self.active_binding() else {
			return;
		};
		if !self.is_visible() {
			return;
		}
		let cached = self.cached();
		if !self.inner.entity.should_refresh(cached.as_ref(), binding.clock.now()) {
			return;
		}
		debug!(entity = self.id(), "status.leader_refresh");
		let engine = self.clone();
		gauge_worker::spawn(TaskClass::Background, async move {
			engine.execute_api_query(false).await;
		});
	}

	fn render(&self, binding: &Binding, snapshot: &CachedStatus<E::Data>) {
		let entity = &self.inner.entity;
		binding.widget.set_text(&entity.get_display_text(&snapshot.data));
		binding.widget.set_tooltip(&entity.generate_tooltip(snapshot));
		binding.widget.set_warning_highlight(entity.should_highlight_warning(&snapshot.data));
	}

	fn render_loading(&self, binding: &Binding) {
		let name = &self.inner.config.name;
		binding.widget.set_text(&format!("{name} …"));
		binding.widget.set_tooltip(&format!("{name}: loading"));
		binding.widget.set_warning_highlight(false);
	}

	fn render_error(&self, binding: &Binding, error: &str) {
		let name = &self.inner.config.name;
		binding.widget.set_text(&format!("{ERROR_GLYPH} {name}"));
		binding
			.widget
			.set_tooltip(&format!("{name}: refresh failed\n{}", truncate(error, ERROR_DETAIL_LIMIT)));
		binding.widget.set_warning_highlight(true);
	}
}

/// Effective delay of a delayed update: `delay`, stretched so it lands no
/// earlier than `min_interval` after the previous one fired. A floor past the
/// representable range keeps the full `min_interval`.
fn debounce_wait(delay: Duration, last: Option<Instant>, min_interval: Duration, now: Instant) -> Duration {
	let floor = match last {
		Some(last) => last
			.checked_add(min_interval)
			.map_or(min_interval, |next| next.saturating_duration_since(now)),
		None => Duration::ZERO,
	};
	delay.max(floor)
}

fn truncate(text: &str, limit: usize) -> String {
	match text.char_indices().nth(limit) {
		Some((cut, _)) => format!("{}…", &text[..cut]),
		None => text.to_string(),
	}
}

/// Periodic task registered with the election on behalf of one engine.
struct RefreshCheck<E: StatusEntity> {
	name: String,
	engine: Weak<Inner<E>>,
}

#[async_trait]
impl<E: StatusEntity> PeriodicTask for RefreshCheck<E> {
	fn name(&self) -> &str {
		&self.name
	}

	async fn run(&self) -> std::result::Result<(), String> {
		if let Some(inner) = self.engine.upgrade() {
			StatusEngine { inner }.leader_round();
		}
		Ok(())
	}
}
