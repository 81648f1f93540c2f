//! Configuration for gauge processes.
//!
//! Configuration is a single TOML document. Every field has a default, so an
//! empty or missing file yields a working setup for the built-in providers.
//!
//! # Configuration Files
//!
//! Gauge reads, in order of preference:
//!
//! 1. The path given on the command line.
//! 2. `$XDG_CONFIG_HOME/gauge/config.toml` (or the platform equivalent).
//! 3. Built-in defaults.
//!
//! # Schema
//!
//! ```toml
//! process_id = "laptop-main"        # default: generated per process
//! store_dir = "/var/lib/gauge"      # default: <data dir>/gauge/store
//!
//! [lease]
//! tick_secs = 15
//! duration_secs = 30
//! confirm_delay_min_ms = 50
//! confirm_delay_max_ms = 250
//!
//! [engine]
//! min_delayed_update_secs = 30
//! cache_check_secs = 10
//! fresh_secs = 5
//! stale_secs = 30
//! expired_secs = 60
//!
//! [[providers]]
//! id = "deepseek"
//! name = "DeepSeek"
//! enabled = true
//! warning_threshold = 10.0
//! refresh_interval_secs = 300
//! priority = 100
//! # api_key = "sk-..."             # default: <ID>_API_KEY from the environment
//! # base_url = "https://..."       # default: the provider's public endpoint
//! ```
//!
//! Listing any `[[providers]]` replaces the built-in list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gauge_lease::LeaseConfig;
use gauge_status::{EngineConfig, MAX_INTERVAL, ProviderSettings};
use serde::{Deserialize, Serialize};

mod error;

pub use error::{ConfigError, Result};

const APP_DIR: &str = "gauge";
const CONFIG_FILE: &str = "config.toml";

/// Parsed configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	/// Fixed identity for leader election. Generated per process when absent.
	pub process_id: Option<String>,
	/// Directory backing the shared store.
	pub store_dir: Option<PathBuf>,
	pub lease: LeaseSettings,
	pub engine: EngineSettings,
	pub providers: Vec<ProviderEntry>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			process_id: None,
			store_dir: None,
			lease: LeaseSettings::default(),
			engine: EngineSettings::default(),
			providers: vec![
				ProviderEntry::builtin("deepseek", "DeepSeek", 100),
				ProviderEntry::builtin("moonshot", "Moonshot", 90),
				ProviderEntry::builtin("siliconflow", "SiliconFlow", 80),
			],
		}
	}
}

/// `[lease]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeaseSettings {
	pub tick_secs: u64,
	pub duration_secs: u64,
	pub confirm_delay_min_ms: u64,
	pub confirm_delay_max_ms: u64,
}

impl Default for LeaseSettings {
	fn default() -> Self {
		Self {
			tick_secs: 15,
			duration_secs: 30,
			confirm_delay_min_ms: 50,
			confirm_delay_max_ms: 250,
		}
	}
}

impl LeaseSettings {
	pub fn to_lease_config(&self) -> LeaseConfig {
		LeaseConfig {
			tick_interval: Duration::from_secs(self.tick_secs),
			lease_duration: Duration::from_secs(self.duration_secs),
			confirm_delay: Duration::from_millis(self.confirm_delay_min_ms)..=Duration::from_millis(self.confirm_delay_max_ms),
		}
	}
}

/// `[engine]` section, shared by every entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
	pub min_delayed_update_secs: u64,
	pub cache_check_secs: u64,
	pub fresh_secs: u64,
	pub stale_secs: u64,
	pub expired_secs: u64,
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			min_delayed_update_secs: 30,
			cache_check_secs: 10,
			fresh_secs: 5,
			stale_secs: 30,
			expired_secs: 60,
		}
	}
}

impl EngineSettings {
	/// Engine configuration for one entity with these timings.
	pub fn engine_config(&self, id: &str, name: &str, priority: i32) -> EngineConfig {
		EngineConfig {
			min_delayed_update_interval: Duration::from_secs(self.min_delayed_update_secs),
			cache_check_interval: Duration::from_secs(self.cache_check_secs),
			fresh_threshold: Duration::from_secs(self.fresh_secs),
			stale_after: Duration::from_secs(self.stale_secs),
			expired_after: Duration::from_secs(self.expired_secs),
			..EngineConfig::new(id, name).with_priority(priority)
		}
	}
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderEntry {
	pub id: String,
	/// Display name; the id when empty.
	pub name: String,
	pub enabled: bool,
	pub warning_threshold: f64,
	pub refresh_interval_secs: u64,
	pub priority: i32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub api_key: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub base_url: Option<String>,
}

impl Default for ProviderEntry {
	fn default() -> Self {
		let settings = ProviderSettings::default();
		Self {
			id: String::new(),
			name: String::new(),
			enabled: true,
			warning_threshold: settings.warning_threshold,
			refresh_interval_secs: settings.refresh_interval.as_secs(),
			priority: 0,
			api_key: None,
			base_url: None,
		}
	}
}

impl ProviderEntry {
	fn builtin(id: &str, name: &str, priority: i32) -> Self {
		Self {
			id: id.to_string(),
			name: name.to_string(),
			priority,
			..Self::default()
		}
	}

	pub fn display_name(&self) -> &str {
		if self.name.trim().is_empty() { &self.id } else { &self.name }
	}

	pub fn settings(&self) -> ProviderSettings {
		ProviderSettings {
			warning_threshold: self.warning_threshold,
			refresh_interval: Duration::from_secs(self.refresh_interval_secs),
		}
	}
}

impl Config {
	/// Parses and validates a TOML string.
	pub fn parse(input: &str) -> Result<Self> {
		let config: Config = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
			path: path.to_path_buf(),
			error: e,
		})?;
		Self::parse(&content)
	}

	/// Loads `explicit` if given, else the default location if it exists,
	/// else built-in defaults.
	///
	/// An explicit path must exist.
	pub fn discover(explicit: Option<&Path>) -> Result<Self> {
		if let Some(path) = explicit {
			return Self::load(path);
		}
		match default_path() {
			Some(path) if path.is_file() => {
				tracing::debug!(path = %path.display(), "config.load");
				Self::load(path)
			}
			_ => {
				tracing::debug!("config.defaults");
				Ok(Self::default())
			}
		}
	}

	/// Checks cross-field constraints serde cannot express.
	pub fn validate(&self) -> Result<()> {
		let invalid = |msg: String| Err(ConfigError::Invalid(msg));

		if self.process_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
			return invalid("process_id must not be blank".into());
		}

		let max_secs = MAX_INTERVAL.as_secs();
		let lease = &self.lease;
		let engine = &self.engine;
		let durations = [
			("lease.tick_secs", lease.tick_secs),
			("lease.duration_secs", lease.duration_secs),
			("lease.confirm_delay_max_ms", lease.confirm_delay_max_ms / 1000),
			("engine.min_delayed_update_secs", engine.min_delayed_update_secs),
			("engine.cache_check_secs", engine.cache_check_secs),
			("engine.fresh_secs", engine.fresh_secs),
			("engine.stale_secs", engine.stale_secs),
			("engine.expired_secs", engine.expired_secs),
		];
		if let Some((field, secs)) = durations.iter().find(|(_, secs)| *secs > max_secs) {
			return invalid(format!("{field} ({secs}s) exceeds the {max_secs}s limit"));
		}

		if lease.tick_secs == 0 || lease.duration_secs == 0 {
			return invalid("lease tick and duration must be positive".into());
		}
		if lease.duration_secs <= lease.tick_secs {
			return invalid(format!(
				"lease duration ({}s) must exceed the tick ({}s) so renewals land before expiry",
				lease.duration_secs, lease.tick_secs
			));
		}
		if lease.confirm_delay_min_ms > lease.confirm_delay_max_ms {
			return invalid("confirm_delay_min_ms must not exceed confirm_delay_max_ms".into());
		}

		if engine.cache_check_secs == 0 {
			return invalid("cache_check_secs must be positive".into());
		}
		if !(engine.fresh_secs <= engine.stale_secs && engine.stale_secs <= engine.expired_secs) {
			return invalid("engine windows must satisfy fresh <= stale <= expired".into());
		}

		let mut seen = HashSet::new();
		for provider in &self.providers {
			if provider.id.trim().is_empty() {
				return invalid("provider id must not be empty".into());
			}
			if !seen.insert(provider.id.as_str()) {
				return invalid(format!("duplicate provider id `{}`", provider.id));
			}
			if !provider.warning_threshold.is_finite() {
				return invalid(format!("provider `{}` warning_threshold must be finite", provider.id));
			}
			if provider.refresh_interval_secs == 0 || provider.refresh_interval_secs > max_secs {
				return invalid(format!(
					"provider `{}` refresh_interval_secs must be between 1 and {max_secs}",
					provider.id
				));
			}
		}
		Ok(())
	}

	/// Providers with `enabled = true`, highest priority first.
	pub fn enabled_providers(&self) -> Vec<&ProviderEntry> {
		let mut enabled: Vec<_> = self.providers.iter().filter(|p| p.enabled).collect();
		enabled.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
		enabled
	}

	/// Store directory: configured, else `<data dir>/gauge/store`, else under
	/// the system temp dir.
	pub fn store_dir(&self) -> PathBuf {
		if let Some(dir) = &self.store_dir {
			return dir.clone();
		}
		dirs::data_dir()
			.unwrap_or_else(std::env::temp_dir)
			.join(APP_DIR)
			.join("store")
	}
}

/// `<config dir>/gauge/config.toml`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}
