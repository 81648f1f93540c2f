//! Host-side adapters: widgets rendered as log events and layered credentials.

use std::sync::Arc;

use gauge_config::Config;
use gauge_query::{CredentialProvider, EnvCredentials, StaticCredentials};
use gauge_status::{StatusWidget, WidgetHost};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Renders every widget as `widget.*` events.
#[derive(Debug, Default)]
pub struct LogWidgetHost;

impl WidgetHost for LogWidgetHost {
	fn create_widget(&self, entity_id: &str, refresh_command: &str, priority: i32) -> Arc<dyn StatusWidget> {
		debug!(entity = entity_id, command = refresh_command, priority, "widget.create");
		Arc::new(LogWidget {
			entity: entity_id.to_string(),
			state: Mutex::new(WidgetState::default()),
		})
	}
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct WidgetState {
	text: String,
	warning: bool,
	visible: bool,
}

/// Logs only changes, so a steady balance stays quiet.
#[derive(Debug)]
struct LogWidget {
	entity: String,
	state: Mutex<WidgetState>,
}

impl LogWidget {
	#[cfg(test)]
	fn state(&self) -> WidgetState {
		self.state.lock().clone()
	}
}

impl StatusWidget for LogWidget {
	fn set_text(&self, text: &str) {
		let mut state = self.state.lock();
		if state.text == text {
			return;
		}
		state.text = text.to_string();
		if state.visible {
			info!(entity = %self.entity, text, "widget.text");
		}
	}

	fn set_tooltip(&self, tooltip: &str) {
		debug!(entity = %self.entity, tooltip, "widget.tooltip");
	}

	fn set_warning_highlight(&self, on: bool) {
		let mut state = self.state.lock();
		if state.warning != on {
			state.warning = on;
			info!(entity = %self.entity, on, "widget.warning");
		}
	}

	fn show(&self) {
		let mut state = self.state.lock();
		if !state.visible {
			state.visible = true;
			info!(entity = %self.entity, text = %state.text, "widget.show");
		}
	}

	fn hide(&self) {
		let mut state = self.state.lock();
		if state.visible {
			state.visible = false;
			debug!(entity = %self.entity, "widget.hide");
		}
	}

	fn dispose(&self) {
		debug!(entity = %self.entity, "widget.dispose");
	}
}

/// Keys from the config file first, then `<ID>_API_KEY` environment variables.
#[derive(Debug, Default)]
pub struct LayeredCredentials {
	configured: StaticCredentials,
	env: EnvCredentials,
}

impl LayeredCredentials {
	pub fn from_config(config: &Config) -> Self {
		let configured = StaticCredentials::new();
		for provider in &config.providers {
			if let Some(key) = &provider.api_key {
				configured.set(provider.id.clone(), key.clone());
			}
		}
		Self {
			configured,
			env: EnvCredentials,
		}
	}
}

impl CredentialProvider for LayeredCredentials {
	fn api_key(&self, provider_id: &str) -> Option<String> {
		self.configured
			.api_key(provider_id)
			.filter(|key| !key.trim().is_empty())
			.or_else(|| self.env.api_key(provider_id))
	}
}

#[cfg(test)]
mod tests {
	use gauge_config::ProviderEntry;

	use super::*;

	#[test]
	fn log_widget_tracks_changes() {
		let widget = LogWidget {
			entity: "deepseek".into(),
			state: Mutex::new(WidgetState::default()),
		};
		widget.set_text("¥42.50");
		widget.show();
		widget.set_warning_highlight(true);
		widget.set_text("¥42.50");

		assert_eq!(
			widget.state(),
			WidgetState {
				text: "¥42.50".into(),
				warning: true,
				visible: true,
			}
		);

		widget.hide();
		assert!(!widget.state().visible);
	}

	#[test]
	fn configured_keys_take_precedence() {
		let config = Config {
			providers: vec![
				ProviderEntry {
					id: "gauge-test-configured".into(),
					api_key: Some("sk-file".into()),
					..ProviderEntry::default()
				},
				ProviderEntry {
					id: "gauge-test-blank".into(),
					api_key: Some("  ".into()),
					..ProviderEntry::default()
				},
			],
			..Config::default()
		};
		let credentials = LayeredCredentials::from_config(&config);

		assert_eq!(credentials.api_key("gauge-test-configured").as_deref(), Some("sk-file"));
		assert!(credentials.has_valid_api_key("gauge-test-configured"));
		assert!(!credentials.has_valid_api_key("gauge-test-blank"));
		assert!(!credentials.has_valid_api_key("gauge-test-unset"));
	}
}
