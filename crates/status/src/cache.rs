//! Persisted snapshot of an entity's last successful query.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EngineConfig;

/// Last successful query result and the moment it completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedStatus<T> {
	pub data: T,
	pub timestamp: DateTime<Utc>,
}

impl<T> CachedStatus<T> {
	pub fn new(data: T, timestamp: DateTime<Utc>) -> Self {
		Self { data, timestamp }
	}

	/// Age relative to `now`. Snapshots stamped in the future count as brand new.
	pub fn age(&self, now: DateTime<Utc>) -> Duration {
		(now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
	}
}

/// How the cache poll treats a snapshot of a given age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotAge {
	/// Within the stale window.
	Recent,
	/// Past the stale window but not expired; still adopted when newer.
	Stale,
	/// Too old to display.
	Expired,
}

impl SnapshotAge {
	pub fn classify(age: Duration, config: &EngineConfig) -> Self {
		if age <= config.stale_after {
			Self::Recent
		} else if age <= config.expired_after {
			Self::Stale
		} else {
			Self::Expired
		}
	}
}

#[cfg(test)]
mod tests {
	use chrono::TimeDelta;

	use super::*;

	fn at(secs: i64) -> DateTime<Utc> {
		DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
	}

	#[test]
	fn age_saturates_for_future_timestamps() {
		let snapshot = CachedStatus::new(1u32, at(10));
		assert_eq!(snapshot.age(at(0)), Duration::ZERO);
		assert_eq!(snapshot.age(at(25)), Duration::from_secs(15));
	}

	#[test]
	fn classification_boundaries() {
		let config = EngineConfig::new("e", "E");
		let classify = |secs| SnapshotAge::classify(Duration::from_secs(secs), &config);
		assert_eq!(classify(0), SnapshotAge::Recent);
		assert_eq!(classify(30), SnapshotAge::Recent);
		assert_eq!(classify(45), SnapshotAge::Stale);
		assert_eq!(classify(60), SnapshotAge::Stale);
		assert_eq!(classify(90), SnapshotAge::Expired);
	}

	#[test]
	fn serialized_shape() {
		let snapshot = CachedStatus::new(42.5f64, at(0) + TimeDelta::nanoseconds(123_456_789));
		let json = serde_json::to_value(&snapshot).unwrap();
		assert_eq!(json["data"], 42.5);
		let back: CachedStatus<f64> = serde_json::from_value(json).unwrap();
		assert_eq!(back, snapshot);
	}
}
