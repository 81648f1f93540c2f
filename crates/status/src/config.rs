use std::time::Duration;

use crate::{Result, StatusError};

/// Prefix of every widget refresh command; the entity id follows.
pub const REFRESH_COMMAND_PREFIX: &str = "gauge.refresh.";

/// Longest interval or window an engine accepts.
pub const MAX_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Per-entity engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
	/// Stable entity identifier, also the widget's identity.
	pub id: String,
	/// Human-readable label.
	pub name: String,
	/// Prefix of the shared store key holding this entity's snapshot.
	pub cache_key_prefix: String,
	/// Widget placement hint; higher sorts first.
	pub priority: i32,
	/// Floor between two executions of [`crate::StatusEngine::delayed_update`].
	pub min_delayed_update_interval: Duration,
	/// Period of the shared-store cache poll.
	pub cache_check_interval: Duration,
	/// Automatic refreshes are skipped while the cache is younger than this.
	pub fresh_threshold: Duration,
	/// Snapshots up to this age are adopted from the store without comment.
	pub stale_after: Duration,
	/// Snapshots older than this are ignored entirely.
	pub expired_after: Duration,
}

impl EngineConfig {
	pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
		let id = id.into();
		Self {
			cache_key_prefix: id.clone(),
			id,
			name: name.into(),
			priority: 0,
			min_delayed_update_interval: Duration::from_secs(30),
			cache_check_interval: Duration::from_secs(10),
			fresh_threshold: Duration::from_secs(5),
			stale_after: Duration::from_secs(30),
			expired_after: Duration::from_secs(60),
		}
	}

	pub fn with_priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}

	/// Shared store key of the persisted snapshot.
	pub fn cache_key(&self) -> String {
		format!("{}.statusData", self.cache_key_prefix)
	}

	/// Command identifier bound to the widget's click action.
	pub fn refresh_command(&self) -> String {
		format!("{REFRESH_COMMAND_PREFIX}{}", self.id)
	}

	pub fn validate(&self) -> Result<()> {
		let invalid = |reason: &str| {
			Err(StatusError::InvalidConfig {
				id: self.id.clone(),
				reason: reason.to_string(),
			})
		};

		if self.id.trim().is_empty() {
			return invalid("id must not be empty");
		}
		if self.name.trim().is_empty() {
			return invalid("name must not be empty");
		}
		if self.cache_key_prefix.trim().is_empty() {
			return invalid("cache key prefix must not be empty");
		}
		if self.cache_check_interval.is_zero() {
			return invalid("cache check interval must be positive");
		}
		let durations = [
			self.min_delayed_update_interval,
			self.cache_check_interval,
			self.fresh_threshold,
			self.stale_after,
			self.expired_after,
		];
		if durations.iter().any(|d| *d > MAX_INTERVAL) {
			return invalid("intervals must not exceed 30 days");
		}
		if self.fresh_threshold > self.stale_after {
			return invalid("fresh threshold must not exceed the stale window");
		}
		if self.stale_after > self.expired_after {
			return invalid("stale window must not exceed expiry");
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_derive_keys_from_id() {
		let config = EngineConfig::new("deepseek", "DeepSeek");
		assert_eq!(config.cache_key(), "deepseek.statusData");
		assert_eq!(config.refresh_command(), "gauge.refresh.deepseek");
		assert_eq!(config.validate(), Ok(()));
	}

	#[test]
	fn blank_fields_are_rejected() {
		let mut config = EngineConfig::new(" ", "DeepSeek");
		assert!(matches!(config.validate(), Err(StatusError::InvalidConfig { .. })));

		config.id = "deepseek".into();
		config.cache_key_prefix.clear();
		assert!(matches!(config.validate(), Err(StatusError::InvalidConfig { .. })));
	}

	#[test]
	fn windows_must_be_ordered() {
		let mut config = EngineConfig::new("deepseek", "DeepSeek");
		config.stale_after = Duration::from_secs(90);
		let Err(StatusError::InvalidConfig { reason, .. }) = config.validate() else {
			panic!("expected invalid config");
		};
		assert!(reason.contains("expiry"));

		let mut config = EngineConfig::new("deepseek", "DeepSeek");
		config.fresh_threshold = Duration::from_secs(45);
		let Err(StatusError::InvalidConfig { reason, .. }) = config.validate() else {
			panic!("expected invalid config");
		};
		assert!(reason.contains("fresh threshold"));
	}

	#[test]
	fn oversized_intervals_are_rejected() {
		let mut config = EngineConfig::new("deepseek", "DeepSeek");
		config.min_delayed_update_interval = Duration::from_secs(i64::MAX as u64);
		assert!(matches!(config.validate(), Err(StatusError::InvalidConfig { .. })));

		config.min_delayed_update_interval = MAX_INTERVAL;
		assert_eq!(config.validate(), Ok(()));

		config.cache_check_interval = MAX_INTERVAL + Duration::from_secs(1);
		assert!(matches!(config.validate(), Err(StatusError::InvalidConfig { .. })));
	}
}
