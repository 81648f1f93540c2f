use async_trait::async_trait;

use crate::{BalanceInfo, Result};

/// Capability shared by every provider backend.
///
/// Response parsing is the backend's business; callers only ever see
/// [`BalanceInfo`] or a [`crate::QueryError`].
#[async_trait]
pub trait BalanceBackend: Send + Sync + std::fmt::Debug {
	async fn query_balance(&self, provider_id: &str) -> Result<BalanceInfo>;
}
