//! Election loop and periodic task execution.

use std::ops::RangeInclusive;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use futures::FutureExt;
use gauge_store::{SharedStore, SharedStoreExt};
use gauge_worker::{ScheduledTask, SharedClock, TaskClass, timer};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::record::{LEASE_KEY, LeaseRecord};
use crate::{LeaseError, PeriodicTask, TaskId};

#[cfg(test)]
mod tests;

/// Election timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseConfig {
	/// Period of the read / claim / renew round.
	pub tick_interval: Duration,
	/// How long a claim or renewal stays valid.
	pub lease_duration: Duration,
	/// Bounds of the randomized wait between writing a claim and reading it back.
	pub confirm_delay: RangeInclusive<Duration>,
}

impl Default for LeaseConfig {
	fn default() -> Self {
		Self {
			tick_interval: Duration::from_secs(15),
			lease_duration: Duration::from_secs(30),
			confirm_delay: Duration::from_millis(50)..=Duration::from_millis(250),
		}
	}
}

/// This process's view of leadership after the most recent round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LeaderState {
	/// No round has completed, the last round hit a store error, or the service stopped.
	#[default]
	Unknown,
	/// Another process holds a live lease.
	Follower { leader: String },
	/// This process holds a confirmed live lease.
	Leader,
}

impl LeaderState {
	pub fn is_leader(&self) -> bool {
		matches!(self, Self::Leader)
	}
}

struct Inner {
	store: Arc<dyn SharedStore>,
	clock: SharedClock,
	config: LeaseConfig,
	process_id: OnceLock<String>,
	state: watch::Sender<LeaderState>,
	tasks: Mutex<Vec<(TaskId, Arc<dyn PeriodicTask>)>>,
	next_task: AtomicU64,
	ticker: Mutex<Option<ScheduledTask>>,
	/// Serializes rounds so a manual [`LeaderElection::tick`] never interleaves with the timer.
	round: tokio::sync::Mutex<()>,
}

/// Lease-based leader election among processes sharing one [`SharedStore`].
///
/// Each round reads the [`LeaseRecord`] under [`LEASE_KEY`]:
///
/// - live and ours: renew it (heartbeat), stay leader.
/// - live and someone else's: follow.
/// - absent or expired: write a claim, wait a randomized delay, read it back.
///   Whoever's claim is observed on the re-read leads; everyone else follows
///   the observed owner.
///
/// Store failures make the round's outcome [`LeaderState::Unknown`], which
/// never runs periodic tasks. Under-execution is preferred to two processes
/// both believing they lead.
///
/// Registered [`PeriodicTask`]s run sequentially after every round that ends
/// with this process as leader.
#[derive(Clone)]
pub struct LeaderElection {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for LeaderElection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LeaderElection")
			.field("process_id", &self.inner.process_id.get())
			.field("state", &*self.inner.state.borrow())
			.field("tasks", &self.inner.tasks.lock().len())
			.finish()
	}
}

impl LeaderElection {
	pub fn new(store: Arc<dyn SharedStore>, clock: SharedClock, config: LeaseConfig) -> Self {
		let (state, _) = watch::channel(LeaderState::Unknown);
		Self {
			inner: Arc::new(Inner {
				store,
				clock,
				config,
				process_id: OnceLock::new(),
				state,
				tasks: Mutex::new(Vec::new()),
				next_task: AtomicU64::new(1),
				ticker: Mutex::new(None),
				round: tokio::sync::Mutex::new(()),
			}),
		}
	}

	/// Binds this service to `process_id`, runs the first round inline, then
	/// starts the periodic round timer.
	pub async fn initialize(&self, process_id: impl Into<String>) -> Result<LeaderState, LeaseError> {
		let process_id = process_id.into();
		if process_id.is_empty() {
			return Err(LeaseError::EmptyProcessId);
		}
		if let Err(rejected) = self.inner.process_id.set(process_id) {
			let existing = self.inner.process_id.get().cloned().unwrap_or(rejected);
			return Err(LeaseError::AlreadyInitialized(existing));
		}
		info!(process_id = %self.process_id().unwrap_or_default(), "lease.initialize");

		let state = self.tick().await;

		let weak: Weak<Inner> = Arc::downgrade(&self.inner);
		let ticker = timer::every(TaskClass::Background, "lease.tick", self.inner.config.tick_interval, move || {
			let weak = weak.clone();
			async move {
				if let Some(inner) = weak.upgrade() {
					LeaderElection { inner }.tick().await;
				}
			}
		});
		*self.inner.ticker.lock() = Some(ticker);
		Ok(state)
	}

	/// Stops the round timer.
	///
	/// The lease is not released; if this process led, others take over once it
	/// expires. The local state drops to [`LeaderState::Unknown`] so no further
	/// periodic work runs here.
	pub fn stop(&self) {
		if let Some(ticker) = self.inner.ticker.lock().take() {
			ticker.cancel();
		}
		self.transition(LeaderState::Unknown);
		debug!(process_id = ?self.process_id(), "lease.stop");
	}

	/// Registers a task to run on every round this process leads.
	pub fn register_periodic_task(&self, task: Arc<dyn PeriodicTask>) -> TaskId {
		let id = TaskId(self.inner.next_task.fetch_add(1, Ordering::Relaxed));
		debug!(task = task.name(), %id, "lease.task.register");
		self.inner.tasks.lock().push((id, task));
		id
	}

	/// Removes a previously registered task. Returns false if it was not registered.
	pub fn unregister_periodic_task(&self, id: TaskId) -> bool {
		let mut tasks = self.inner.tasks.lock();
		let before = tasks.len();
		tasks.retain(|(task_id, _)| *task_id != id);
		before != tasks.len()
	}

	pub fn process_id(&self) -> Option<String> {
		self.inner.process_id.get().cloned()
	}

	pub fn state(&self) -> LeaderState {
		self.inner.state.borrow().clone()
	}

	pub fn is_leader(&self) -> bool {
		self.inner.state.borrow().is_leader()
	}

	/// Owner of the live lease as last observed, if known.
	pub fn current_leader(&self) -> Option<String> {
		match &*self.inner.state.borrow() {
			LeaderState::Leader => self.process_id(),
			LeaderState::Follower { leader } => Some(leader.clone()),
			LeaderState::Unknown => None,
		}
	}

	/// Subscribes to leadership transitions.
	pub fn subscribe(&self) -> watch::Receiver<LeaderState> {
		self.inner.state.subscribe()
	}

	/// Runs one election round, then the periodic tasks if this process leads.
	///
	/// Returns [`LeaderState::Unknown`] without touching the store when the
	/// service has not been initialized.
	pub async fn tick(&self) -> LeaderState {
		let _round = self.inner.round.lock().await;
		let Some(process_id) = self.inner.process_id.get().cloned() else {
			return LeaderState::Unknown;
		};

		let state = self.elect(&process_id).await;
		self.transition(state.clone());
		if state.is_leader() {
			self.run_tasks().await;
		}
		state
	}

	async fn elect(&self, process_id: &str) -> LeaderState {
		let now = self.inner.clock.now();
		let observed = match self.inner.store.get_json::<LeaseRecord>(LEASE_KEY).await {
			Ok(observed) => observed,
			Err(error) => {
				warn!(%error, "lease.read_failed");
				return LeaderState::Unknown;
			}
		};

		match observed {
			Some(record) if !record.is_expired(now) && record.is_held_by(process_id) => self.renew(&record, now).await,
			Some(record) if !record.is_expired(now) => LeaderState::Follower { leader: record.owner_id },
			_ => self.claim(process_id, now).await,
		}
	}

	async fn renew(&self, record: &LeaseRecord, now: chrono::DateTime<chrono::Utc>) -> LeaderState {
		let renewed = record.renewed(now, self.inner.config.lease_duration);
		match self.inner.store.set_json(LEASE_KEY, &renewed).await {
			Ok(()) => {
				tracing::trace!(expires_at = %renewed.expires_at, "lease.renew");
				LeaderState::Leader
			}
			Err(error) => {
				warn!(%error, "lease.renew_failed");
				LeaderState::Unknown
			}
		}
	}

	/// Writes a claim, waits the confirm delay, then reads the lease back.
	///
	/// The record read back decides the round on its own. `acquired_at` and
	/// `owner_id` are never compared: the store keeps only the last write, so
	/// every racer reads the same record, while a field comparison could let
	/// a process whose claim was overwritten also believe it leads.
	async fn claim(&self, process_id: &str, now: chrono::DateTime<chrono::Utc>) -> LeaderState {
		let claim = LeaseRecord::claim(process_id, now, self.inner.config.lease_duration);
		if let Err(error) = self.inner.store.set_json(LEASE_KEY, &claim).await {
			warn!(%error, "lease.claim_failed");
			return LeaderState::Unknown;
		}

		tokio::time::sleep(self.confirm_delay()).await;

		match self.inner.store.get_json::<LeaseRecord>(LEASE_KEY).await {
			Ok(Some(observed)) if observed.is_held_by(process_id) => LeaderState::Leader,
			Ok(Some(observed)) => {
				debug!(winner = %observed.owner_id, "lease.claim_lost");
				LeaderState::Follower { leader: observed.owner_id }
			}
			Ok(None) => {
				warn!("lease.claim_vanished");
				LeaderState::Unknown
			}
			Err(error) => {
				warn!(%error, "lease.confirm_failed");
				LeaderState::Unknown
			}
		}
	}

	fn confirm_delay(&self) -> Duration {
		let range = &self.inner.config.confirm_delay;
		let (lo, hi) = (range.start().as_millis() as u64, range.end().as_millis() as u64);
		if hi <= lo {
			return Duration::from_millis(lo);
		}
		Duration::from_millis(rand::rng().random_range(lo..=hi))
	}

	fn transition(&self, next: LeaderState) {
		let process_id = self.inner.process_id.get().map(String::as_str).unwrap_or("");
		self.inner.state.send_if_modified(|current| {
			if *current == next {
				return false;
			}
			match (&*current, &next) {
				(_, LeaderState::Leader) => info!(process_id, "lease.acquired"),
				(LeaderState::Leader, _) => info!(process_id, next = ?next, "lease.lost"),
				_ => debug!(process_id, next = ?next, "lease.observe"),
			}
			*current = next;
			true
		});
	}

	async fn run_tasks(&self) {
		let tasks: Vec<_> = self.inner.tasks.lock().iter().map(|(id, task)| (*id, Arc::clone(task))).collect();
		for (id, task) in tasks {
			match AssertUnwindSafe(task.run()).catch_unwind().await {
				Ok(Ok(())) => {}
				Ok(Err(error)) => warn!(task = task.name(), %id, %error, "lease.task.failed"),
				Err(_) => warn!(task = task.name(), %id, "lease.task.panicked"),
			}
		}
	}
}
