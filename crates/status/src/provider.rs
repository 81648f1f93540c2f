//! Balance display for one query provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gauge_query::{BalanceInfo, CredentialProvider, QueryRegistry, QueryResult};

use crate::{CachedStatus, StatusEntity};

/// Refreshes are due this long before the configured interval elapses, so a
/// leader round landing just short of the deadline still fires.
const REFRESH_MARGIN: Duration = Duration::from_secs(5);

/// Per-provider presentation and refresh settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
	/// Balances below this are highlighted.
	pub warning_threshold: f64,
	pub refresh_interval: Duration,
}

impl Default for ProviderSettings {
	fn default() -> Self {
		Self {
			warning_threshold: 10.0,
			refresh_interval: Duration::from_secs(300),
		}
	}
}

/// [`StatusEntity`] showing the account balance of a query provider.
///
/// Visible only while the credential provider holds a usable key for it.
pub struct ProviderStatusEntity {
	provider_id: String,
	name: String,
	settings: ProviderSettings,
	queries: Arc<QueryRegistry>,
	credentials: Arc<dyn CredentialProvider>,
}

impl ProviderStatusEntity {
	pub fn new(
		provider_id: impl Into<String>,
		name: impl Into<String>,
		queries: Arc<QueryRegistry>,
		credentials: Arc<dyn CredentialProvider>,
	) -> Self {
		Self {
			provider_id: provider_id.into(),
			name: name.into(),
			settings: ProviderSettings::default(),
			queries,
			credentials,
		}
	}

	pub fn with_settings(mut self, settings: ProviderSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn provider_id(&self) -> &str {
		&self.provider_id
	}

	pub fn settings(&self) -> &ProviderSettings {
		&self.settings
	}
}

#[async_trait]
impl StatusEntity for ProviderStatusEntity {
	type Data = BalanceInfo;

	async fn perform_api_query(&self) -> QueryResult<BalanceInfo> {
		self.queries.query(&self.provider_id).await
	}

	fn get_display_text(&self, data: &BalanceInfo) -> String {
		format_amount(data.balance, &data.currency)
	}

	fn generate_tooltip(&self, cached: &CachedStatus<BalanceInfo>) -> String {
		let data = &cached.data;
		let mut lines = vec![
			self.name.clone(),
			format!("Balance: {}", format_amount(data.balance, &data.currency)),
		];
		if let Some(paid) = data.paid {
			lines.push(format!("Paid: {}", format_amount(paid, &data.currency)));
		}
		if let Some(granted) = data.granted {
			lines.push(format!("Granted: {}", format_amount(granted, &data.currency)));
		}
		if self.should_highlight_warning(data) {
			lines.push(format!(
				"Below warning threshold of {}",
				format_amount(self.settings.warning_threshold, &data.currency)
			));
		}
		lines.push(format!("Updated: {}", cached.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
		lines.push("Click to refresh".to_string());
		lines.join("\n")
	}

	fn should_highlight_warning(&self, data: &BalanceInfo) -> bool {
		data.balance < self.settings.warning_threshold
	}

	fn should_refresh(&self, cached: Option<&CachedStatus<BalanceInfo>>, now: DateTime<Utc>) -> bool {
		let due = self.settings.refresh_interval.saturating_sub(REFRESH_MARGIN);
		cached.is_none_or(|cached| cached.age(now) >= due)
	}

	fn should_show_status_bar(&self) -> bool {
		self.credentials.has_valid_api_key(&self.provider_id)
	}
}

/// Display symbol for an ISO currency code. Unknown codes are spelled out.
pub fn currency_symbol(code: &str) -> String {
	match code.to_ascii_uppercase().as_str() {
		"CNY" | "RMB" | "JPY" => "¥".to_string(),
		"USD" => "$".to_string(),
		"EUR" => "€".to_string(),
		"GBP" => "£".to_string(),
		_ => format!("{code} "),
	}
}

pub fn format_amount(amount: f64, currency: &str) -> String {
	format!("{}{amount:.2}", currency_symbol(currency))
}
