//! Provider id to backend dispatch.

use std::collections::HashMap;
use std::sync::{Arc, Once};

use parking_lot::RwLock;
use tracing::debug;

use crate::providers::{BUILTIN_PROVIDERS, HttpBalanceBackend};
use crate::{BalanceBackend, BalanceInfo, CredentialProvider, QueryResult};

/// Stateless dispatch table from provider id to [`BalanceBackend`].
///
/// No retries and no caching happen here. Querying a provider with no backend
/// yields a successful zero balance so callers can render "0" instead of
/// failing on unknown ids.
///
/// Built-in backends from [`crate::providers`] are installed on the first
/// call into the registry, not at construction. Explicit registrations made
/// before that point are kept.
pub struct QueryRegistry {
	handlers: RwLock<HashMap<String, Arc<dyn BalanceBackend>>>,
	defaults: Option<Arc<dyn CredentialProvider>>,
	defaults_once: Once,
}

impl std::fmt::Debug for QueryRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut ids: Vec<_> = self.handlers.read().keys().cloned().collect();
		ids.sort();
		f.debug_struct("QueryRegistry")
			.field("handlers", &ids)
			.field("defaults_installed", &self.defaults_once.is_completed())
			.finish()
	}
}

impl Default for QueryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl QueryRegistry {
	/// Empty registry without built-in backends.
	pub fn new() -> Self {
		Self {
			handlers: RwLock::new(HashMap::new()),
			defaults: None,
			defaults_once: Once::new(),
		}
	}

	/// Registry that lazily installs the built-in HTTP backends.
	pub fn with_defaults(credentials: Arc<dyn CredentialProvider>) -> Self {
		Self {
			defaults: Some(credentials),
			..Self::new()
		}
	}

	fn ensure_defaults(&self) {
		let Some(credentials) = &self.defaults else {
			return;
		};
		self.defaults_once.call_once(|| {
			let mut handlers = self.handlers.write();
			for def in BUILTIN_PROVIDERS {
				handlers
					.entry(def.id.to_string())
					.or_insert_with(|| Arc::new(HttpBalanceBackend::new(def, Arc::clone(credentials))));
			}
			debug!(count = handlers.len(), "query.defaults.installed");
		});
	}

	/// Registers `handler` for `provider_id`, replacing any previous one.
	pub fn register(&self, provider_id: impl Into<String>, handler: Arc<dyn BalanceBackend>) {
		self.ensure_defaults();
		let provider_id = provider_id.into();
		debug!(provider = %provider_id, "query.register");
		self.handlers.write().insert(provider_id, handler);
	}

	/// Removes the handler for `provider_id`. Returns false if none was registered.
	pub fn unregister(&self, provider_id: &str) -> bool {
		self.ensure_defaults();
		self.handlers.write().remove(provider_id).is_some()
	}

	pub fn has_handler(&self, provider_id: &str) -> bool {
		self.ensure_defaults();
		self.handlers.read().contains_key(provider_id)
	}

	/// Registered provider ids, sorted.
	pub fn list_registered(&self) -> Vec<String> {
		self.ensure_defaults();
		let mut ids: Vec<_> = self.handlers.read().keys().cloned().collect();
		ids.sort();
		ids
	}

	/// Queries the balance of `provider_id` through its backend.
	pub async fn query(&self, provider_id: &str) -> QueryResult<BalanceInfo> {
		self.ensure_defaults();
		let handler = self.handlers.read().get(provider_id).cloned();
		let Some(handler) = handler else {
			debug!(provider = provider_id, "query.unregistered");
			return QueryResult::ok(BalanceInfo::default());
		};

		let result = handler.query_balance(provider_id).await;
		if let Err(error) = &result {
			debug!(provider = provider_id, %error, "query.failed");
		}
		result.into()
	}
}
