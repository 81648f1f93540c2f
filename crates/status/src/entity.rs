use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gauge_query::QueryResult;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CachedStatus;

/// Domain half of a status item.
///
/// The engine owns caching, scheduling and widget plumbing; an entity only
/// knows how to fetch its data and how to present it.
#[async_trait]
pub trait StatusEntity: Send + Sync + 'static {
	/// Payload cached in memory and persisted to the shared store.
	type Data: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

	/// Fetches fresh data. Failures are reported in the result, never panicked.
	async fn perform_api_query(&self) -> QueryResult<Self::Data>;

	/// Short text shown in the status bar.
	fn get_display_text(&self, data: &Self::Data) -> String;

	/// Multi-line hover text.
	fn generate_tooltip(&self, cached: &CachedStatus<Self::Data>) -> String;

	fn should_highlight_warning(&self, data: &Self::Data) -> bool;

	/// Asked on every leader round whether a background refresh is due.
	fn should_refresh(&self, cached: Option<&CachedStatus<Self::Data>>, now: DateTime<Utc>) -> bool;

	/// Whether the item should be visible at all, e.g. a credential is present.
	fn should_show_status_bar(&self) -> bool;
}
