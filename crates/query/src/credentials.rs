//! API key lookup.
//!
//! Engines only ask whether a key exists (to decide visibility); backends
//! fetch the key itself right before each request. Neither caches it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Source of provider API keys.
pub trait CredentialProvider: Send + Sync + fmt::Debug {
	fn api_key(&self, provider_id: &str) -> Option<String>;

	fn has_valid_api_key(&self, provider_id: &str) -> bool {
		self.api_key(provider_id).is_some_and(|key| !key.trim().is_empty())
	}
}

/// In-memory keys, editable at runtime.
#[derive(Default, Clone)]
pub struct StaticCredentials {
	keys: Arc<RwLock<HashMap<String, String>>>,
}

impl StaticCredentials {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&self, provider_id: impl Into<String>, key: impl Into<String>) {
		self.keys.write().insert(provider_id.into(), key.into());
	}

	pub fn remove(&self, provider_id: &str) {
		self.keys.write().remove(provider_id);
	}
}

impl fmt::Debug for StaticCredentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut providers: Vec<_> = self.keys.read().keys().cloned().collect();
		providers.sort();
		f.debug_struct("StaticCredentials").field("providers", &providers).finish()
	}
}

impl CredentialProvider for StaticCredentials {
	fn api_key(&self, provider_id: &str) -> Option<String> {
		self.keys.read().get(provider_id).cloned()
	}
}

/// Keys from `<PROVIDER>_API_KEY` environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl EnvCredentials {
	/// Variable consulted for `provider_id`, e.g. `DEEPSEEK_API_KEY`.
	pub fn var_name(provider_id: &str) -> String {
		let stem: String = provider_id
			.chars()
			.map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
			.collect();
		format!("{stem}_API_KEY")
	}
}

impl CredentialProvider for EnvCredentials {
	fn api_key(&self, provider_id: &str) -> Option<String> {
		std::env::var(Self::var_name(provider_id)).ok()
	}
}
