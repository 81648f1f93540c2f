use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Store key holding the single [`LeaseRecord`] shared by all processes.
pub const LEASE_KEY: &str = "gauge.leader.lease";

/// Persisted claim of leadership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseRecord {
	pub owner_id: String,
	pub acquired_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl LeaseRecord {
	/// Fresh claim by `owner_id` starting at `now`.
	pub fn claim(owner_id: impl Into<String>, now: DateTime<Utc>, duration: Duration) -> Self {
		Self {
			owner_id: owner_id.into(),
			acquired_at: now,
			expires_at: offset(now, duration),
		}
	}

	/// Same claim with its expiry pushed out from `now`.
	pub fn renewed(&self, now: DateTime<Utc>, duration: Duration) -> Self {
		Self {
			owner_id: self.owner_id.clone(),
			acquired_at: self.acquired_at,
			expires_at: offset(now, duration),
		}
	}

	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at < now
	}

	pub fn is_held_by(&self, process_id: &str) -> bool {
		self.owner_id == process_id
	}
}

/// `now + duration`, saturating at the latest representable instant.
fn offset(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
	TimeDelta::from_std(duration)
		.ok()
		.and_then(|delta| now.checked_add_signed(delta))
		.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn at(secs: i64) -> DateTime<Utc> {
		DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
	}

	#[test]
	fn expiry_is_strictly_after_expires_at() {
		let rec = LeaseRecord::claim("p1", at(0), Duration::from_secs(30));
		assert!(!rec.is_expired(at(30)));
		assert!(rec.is_expired(at(31)));
	}

	#[test]
	fn renewal_keeps_acquired_at() {
		let rec = LeaseRecord::claim("p1", at(0), Duration::from_secs(30));
		let renewed = rec.renewed(at(15), Duration::from_secs(30));
		assert_eq!(renewed.acquired_at, at(0));
		assert_eq!(renewed.expires_at, at(45));
		assert!(renewed.is_held_by("p1"));
	}

	#[test]
	fn wire_format_uses_camel_case() {
		let rec = LeaseRecord::claim("p1", at(0), Duration::from_secs(30));
		let json = serde_json::to_value(&rec).unwrap();
		assert_eq!(json["ownerId"], "p1");
		assert!(json.get("expiresAt").is_some());
		let back: LeaseRecord = serde_json::from_value(json).unwrap();
		assert_eq!(back, rec);
	}
}
