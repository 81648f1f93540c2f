//! Wall-clock sources.
//!
//! Lease records and cache snapshots are compared across processes, so they
//! carry wall-clock [`DateTime<Utc>`] stamps rather than monotonic instants.
//! Components read "now" through [`Clock`] so tests can pin or step it.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
	fn now(&self) -> DateTime<Utc>;
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Operating system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Wall clock that advances with the tokio clock.
///
/// Anchored to a wall-clock instant at construction, then moved forward by the
/// elapsed [`tokio::time::Instant`] time. Under a paused test runtime it only
/// moves when the runtime clock does, which keeps timer firings and timestamp
/// arithmetic in lockstep.
#[derive(Debug, Clone)]
pub struct RuntimeClock {
	wall: DateTime<Utc>,
	anchor: tokio::time::Instant,
}

impl RuntimeClock {
	pub fn new() -> Self {
		Self::starting_at(Utc::now())
	}

	pub fn starting_at(wall: DateTime<Utc>) -> Self {
		Self {
			wall,
			anchor: tokio::time::Instant::now(),
		}
	}
}

impl Default for RuntimeClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for RuntimeClock {
	fn now(&self) -> DateTime<Utc> {
		let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or_else(|_| TimeDelta::zero());
		self.wall + elapsed
	}
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
	now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Arc::new(Mutex::new(start)),
		}
	}

	pub fn set(&self, now: DateTime<Utc>) {
		*self.now.lock() = now;
	}

	pub fn advance(&self, by: TimeDelta) {
		let mut now = self.now.lock();
		*now += by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn runtime_clock_follows_paused_time() {
		let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
		let clock = RuntimeClock::starting_at(start);
		assert_eq!(clock.now(), start);

		tokio::time::advance(Duration::from_secs(45)).await;
		assert_eq!(clock.now(), start + TimeDelta::seconds(45));
	}

	#[test]
	fn manual_clock_shares_state_between_clones() {
		let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
		let clock = ManualClock::new(start);
		let other = clock.clone();
		other.advance(TimeDelta::seconds(90));
		assert_eq!(clock.now(), start + TimeDelta::seconds(90));
	}
}
