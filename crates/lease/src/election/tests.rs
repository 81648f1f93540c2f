use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use gauge_store::testing::FlakyStore;
use gauge_store::{MemoryStore, SharedStore};
use gauge_worker::{Clock, RuntimeClock};
use serde_json::Value;

use super::*;
use crate::task_fn;

/// Store that yields before every operation so concurrent rounds interleave.
#[derive(Debug, Clone, Default)]
struct YieldingStore {
	inner: MemoryStore,
}

#[async_trait]
impl SharedStore for YieldingStore {
	async fn get(&self, key: &str) -> gauge_store::Result<Option<Value>> {
		tokio::task::yield_now().await;
		self.inner.get(key).await
	}

	async fn set(&self, key: &str, value: Value) -> gauge_store::Result<()> {
		tokio::task::yield_now().await;
		self.inner.set(key, value).await
	}
}

/// Store where another process overwrites the lease right after our claim lands.
#[derive(Debug, Default)]
struct OverwrittenClaimStore {
	inner: MemoryStore,
	rival: parking_lot::Mutex<Option<LeaseRecord>>,
}

#[async_trait]
impl SharedStore for OverwrittenClaimStore {
	async fn get(&self, key: &str) -> gauge_store::Result<Option<Value>> {
		self.inner.get(key).await
	}

	async fn set(&self, key: &str, value: Value) -> gauge_store::Result<()> {
		self.inner.set(key, value).await?;
		let rival = self.rival.lock().take();
		if let Some(rival) = rival {
			self.inner.set(key, serde_json::to_value(rival).unwrap()).await?;
		}
		Ok(())
	}
}

fn start() -> DateTime<Utc> {
	DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Config whose timer never fires within a test, so rounds are driven by hand.
fn manual_config() -> LeaseConfig {
	LeaseConfig {
		tick_interval: Duration::from_secs(3600),
		..LeaseConfig::default()
	}
}

fn election(store: Arc<dyn SharedStore>, clock: &RuntimeClock, config: LeaseConfig) -> LeaderElection {
	LeaderElection::new(store, Arc::new(clock.clone()), config)
}

async fn stored(store: &MemoryStore) -> LeaseRecord {
	let value = store.get(LEASE_KEY).await.unwrap().expect("lease record");
	serde_json::from_value(value).unwrap()
}

fn counting_task(name: &str) -> (Arc<dyn PeriodicTask>, Arc<AtomicUsize>) {
	let hits = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&hits);
	let task = task_fn(name, move || {
		let counter = Arc::clone(&counter);
		async move {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	});
	(task, hits)
}

async fn settle() {
	for _ in 0..8 {
		tokio::task::yield_now().await;
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn first_process_claims_absent_lease() {
	let store = MemoryStore::new();
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, manual_config());

	assert_eq!(a.initialize("a").await, Ok(LeaderState::Leader));
	assert!(a.is_leader());
	assert_eq!(a.current_leader().as_deref(), Some("a"));

	let rec = stored(&store).await;
	assert_eq!(rec.owner_id, "a");
	assert_eq!(rec.expires_at - rec.acquired_at, TimeDelta::seconds(30));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn racing_claims_agree_on_one_winner() {
	let store = YieldingStore::default();
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, manual_config());
	let b = election(Arc::new(store.clone()), &clock, manual_config());

	let (ra, rb) = tokio::join!(a.initialize("a"), b.initialize("b"));
	let (ra, rb) = (ra.unwrap(), rb.unwrap());

	assert_eq!(usize::from(ra.is_leader()) + usize::from(rb.is_leader()), 1, "exactly one leader: {ra:?} / {rb:?}");

	let winner = stored(&store.inner).await.owner_id;
	let (leader, follower) = if ra.is_leader() { (&a, &b) } else { (&b, &a) };
	assert_eq!(leader.process_id(), Some(winner.clone()));
	assert_eq!(follower.current_leader(), Some(winner));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn record_read_back_decides_claim() {
	let clock = RuntimeClock::starting_at(start());
	// Acquired later and sorting after "a": only the re-read makes it the winner.
	let rival = LeaseRecord::claim("z", start() + TimeDelta::seconds(1), Duration::from_secs(30));
	let store = Arc::new(OverwrittenClaimStore {
		rival: parking_lot::Mutex::new(Some(rival)),
		..OverwrittenClaimStore::default()
	});
	let a = election(store.clone(), &clock, manual_config());

	assert_eq!(a.initialize("a").await, Ok(LeaderState::Follower { leader: "z".into() }));
	assert!(!a.is_leader());
	assert_eq!(stored(&store.inner).await.owner_id, "z");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn live_lease_makes_late_process_a_follower() {
	let store = MemoryStore::new();
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, manual_config());
	let b = election(Arc::new(store.clone()), &clock, manual_config());

	a.initialize("a").await.unwrap();
	let state = b.initialize("b").await.unwrap();

	assert_eq!(state, LeaderState::Follower { leader: "a".into() });
	assert_eq!(stored(&store).await.owner_id, "a");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn leader_renews_on_each_tick() {
	let store = MemoryStore::new();
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, LeaseConfig::default());
	a.initialize("a").await.unwrap();
	settle().await;
	let first = stored(&store).await;

	tokio::time::advance(Duration::from_secs(15)).await;
	settle().await;

	let renewed = stored(&store).await;
	assert_eq!(renewed.acquired_at, first.acquired_at);
	assert_eq!(renewed.expires_at, clock.now() + TimeDelta::seconds(30));
	assert!(renewed.expires_at > first.expires_at);
	assert!(a.is_leader());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn follower_takes_over_after_leader_stops() {
	let store = MemoryStore::new();
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, manual_config());
	let b = election(Arc::new(store.clone()), &clock, manual_config());
	a.initialize("a").await.unwrap();
	b.initialize("b").await.unwrap();

	a.stop();
	assert_eq!(a.state(), LeaderState::Unknown);
	assert_eq!(stored(&store).await.owner_id, "a", "stop must not release the lease");

	tokio::time::advance(Duration::from_secs(20)).await;
	assert_eq!(b.tick().await, LeaderState::Follower { leader: "a".into() });

	tokio::time::advance(Duration::from_secs(11)).await;
	assert_eq!(b.tick().await, LeaderState::Leader);
	assert_eq!(stored(&store).await.owner_id, "b");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn follower_never_runs_tasks() {
	let store = MemoryStore::new();
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, manual_config());
	let b = election(Arc::new(store.clone()), &clock, manual_config());
	let (task_a, hits_a) = counting_task("a.refresh");
	let (task_b, hits_b) = counting_task("b.refresh");
	a.register_periodic_task(task_a);
	b.register_periodic_task(task_b);

	a.initialize("a").await.unwrap();
	b.initialize("b").await.unwrap();
	a.tick().await;
	b.tick().await;

	assert_eq!(hits_a.load(Ordering::SeqCst), 2);
	assert_eq!(hits_b.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn store_outage_demotes_to_unknown() {
	let store = FlakyStore::new(MemoryStore::new());
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, manual_config());
	let (task, hits) = counting_task("refresh");
	a.register_periodic_task(task);
	a.initialize("a").await.unwrap();
	assert_eq!(hits.load(Ordering::SeqCst), 1);

	store.set_failing(true);
	assert_eq!(a.tick().await, LeaderState::Unknown);
	assert!(!a.is_leader());
	assert_eq!(hits.load(Ordering::SeqCst), 1);

	store.set_failing(false);
	assert_eq!(a.tick().await, LeaderState::Leader);
	assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn store_outage_before_first_round_never_leads() {
	let store = FlakyStore::new(MemoryStore::new());
	store.set_failing(true);
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, manual_config());

	assert_eq!(a.initialize("a").await, Ok(LeaderState::Unknown));
	assert_eq!(a.current_leader(), None);
}

struct PanickingTask;

#[async_trait]
impl PeriodicTask for PanickingTask {
	fn name(&self) -> &str {
		"panicking"
	}

	async fn run(&self) -> Result<(), String> {
		panic!("task blew up")
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn task_failure_is_contained() {
	let store = MemoryStore::new();
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store), &clock, manual_config());

	let failures = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&failures);
	a.register_periodic_task(task_fn("failing", move || {
		let counter = Arc::clone(&counter);
		async move {
			counter.fetch_add(1, Ordering::SeqCst);
			Err("provider unreachable".to_string())
		}
	}));
	a.register_periodic_task(Arc::new(PanickingTask));
	let (task, hits) = counting_task("healthy");
	a.register_periodic_task(task);

	a.initialize("a").await.unwrap();
	a.tick().await;

	assert_eq!(failures.load(Ordering::SeqCst), 2);
	assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn unregistered_task_stops_running() {
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(MemoryStore::new()), &clock, manual_config());
	let (task, hits) = counting_task("refresh");
	let id = a.register_periodic_task(task);
	a.initialize("a").await.unwrap();

	assert!(a.unregister_periodic_task(id));
	assert!(!a.unregister_periodic_task(id));
	a.tick().await;
	assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn initialize_validates_process_id() {
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(MemoryStore::new()), &clock, manual_config());

	assert_eq!(a.initialize("").await, Err(LeaseError::EmptyProcessId));
	a.initialize("a").await.unwrap();
	assert_eq!(a.initialize("b").await, Err(LeaseError::AlreadyInitialized("a".into())));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn tick_before_initialize_is_inert() {
	let store = FlakyStore::new(MemoryStore::new());
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, manual_config());

	assert_eq!(a.tick().await, LeaderState::Unknown);
	assert_eq!(store.reads(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn subscribers_see_transitions() {
	let store = FlakyStore::new(MemoryStore::new());
	let clock = RuntimeClock::starting_at(start());
	let a = election(Arc::new(store.clone()), &clock, manual_config());
	let mut rx = a.subscribe();

	a.initialize("a").await.unwrap();
	assert!(rx.has_changed().unwrap());
	assert_eq!(*rx.borrow_and_update(), LeaderState::Leader);

	store.set_failing(true);
	a.tick().await;
	assert_eq!(*rx.borrow_and_update(), LeaderState::Unknown);
}
