//! Built-in HTTP balance backends.
//!
//! Each provider is described by a static [`ProviderDef`]: where its balance
//! endpoint lives and how to pull the few fields the engine needs out of the
//! response. [`HttpBalanceBackend`] does the request plumbing for all of them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;

use crate::{BalanceBackend, BalanceInfo, CredentialProvider, QueryError, Result};

mod deepseek;
mod moonshot;
mod siliconflow;

pub use deepseek::DEEPSEEK;
pub use moonshot::MOONSHOT;
pub use siliconflow::SILICONFLOW;

/// Providers registered by [`crate::QueryRegistry::with_defaults`].
pub static BUILTIN_PROVIDERS: &[&ProviderDef] = &[&DEEPSEEK, &MOONSHOT, &SILICONFLOW];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Error bodies are cut to this many characters before being surfaced.
const MAX_ERROR_BODY: usize = 200;

/// Static description of one provider's balance endpoint.
pub struct ProviderDef {
	pub id: &'static str,
	pub name: &'static str,
	pub base_url: &'static str,
	pub balance_path: &'static str,
	pub parse: fn(&Value) -> Result<BalanceInfo>,
}

impl fmt::Debug for ProviderDef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProviderDef")
			.field("id", &self.id)
			.field("base_url", &self.base_url)
			.field("balance_path", &self.balance_path)
			.finish()
	}
}

/// Looks up a built-in provider by id.
pub fn builtin(id: &str) -> Option<&'static ProviderDef> {
	BUILTIN_PROVIDERS.iter().copied().find(|def| def.id == id)
}

/// Bearer-authenticated `GET` against a provider's balance endpoint.
#[derive(Debug, Clone)]
pub struct HttpBalanceBackend {
	def: &'static ProviderDef,
	base_url: String,
	client: Client,
	credentials: Arc<dyn CredentialProvider>,
}

impl HttpBalanceBackend {
	pub fn new(def: &'static ProviderDef, credentials: Arc<dyn CredentialProvider>) -> Self {
		Self {
			def,
			base_url: def.base_url.to_string(),
			client: Client::new(),
			credentials,
		}
	}

	/// Points the backend at another host (proxies, tests).
	#[must_use]
	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into().trim_end_matches('/').to_string();
		self
	}

	pub fn def(&self) -> &'static ProviderDef {
		self.def
	}
}

#[async_trait]
impl BalanceBackend for HttpBalanceBackend {
	async fn query_balance(&self, provider_id: &str) -> Result<BalanceInfo> {
		let key = self
			.credentials
			.api_key(provider_id)
			.filter(|key| !key.trim().is_empty())
			.ok_or_else(|| QueryError::MissingCredential(provider_id.to_string()))?;

		let url = format!("{}{}", self.base_url, self.def.balance_path);
		tracing::debug!(provider = provider_id, %url, "query.http.request");
		let body = get_json(&self.client, &url, &key).await?;
		(self.def.parse)(&body)
	}
}

async fn get_json(client: &Client, url: &str, api_key: &str) -> Result<Value> {
	let response = client
		.get(url)
		.bearer_auth(api_key)
		.header(ACCEPT, "application/json")
		.timeout(REQUEST_TIMEOUT)
		.send()
		.await
		.map_err(|e| QueryError::Network(e.to_string()))?;

	let status = response.status();
	if !status.is_success() {
		let text = response.text().await.unwrap_or_default();
		return Err(QueryError::Status {
			status: status.as_u16(),
			body: truncate(text.trim(), MAX_ERROR_BODY),
		});
	}

	response
		.json::<Value>()
		.await
		.map_err(|e| QueryError::Malformed(format!("invalid JSON: {e}")))
}

fn truncate(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((idx, _)) => format!("{}…", &text[..idx]),
		None => text.to_string(),
	}
}

/// Reads a number that providers may encode either as a JSON number or a string.
fn number(value: &Value) -> Option<f64> {
	match value {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}

fn required_number(object: &Value, field: &str) -> Result<f64> {
	object
		.get(field)
		.and_then(number)
		.ok_or_else(|| QueryError::Malformed(format!("missing numeric field `{field}`")))
}

fn optional_number(object: &Value, field: &str) -> Option<f64> {
	object.get(field).and_then(number)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::StaticCredentials;

	fn backend(server: &mockito::Server, creds: &StaticCredentials) -> HttpBalanceBackend {
		HttpBalanceBackend::new(&DEEPSEEK, Arc::new(creds.clone())).with_base_url(server.url())
	}

	#[test]
	fn numbers_accept_strings() {
		assert_eq!(number(&json!("42.50")), Some(42.5));
		assert_eq!(number(&json!(3)), Some(3.0));
		assert_eq!(number(&json!("n/a")), None);
		assert_eq!(number(&json!(null)), None);
	}

	#[test]
	fn truncation_respects_char_boundaries() {
		assert_eq!(truncate("余额不足", 2), "余额…");
		assert_eq!(truncate("short", 10), "short");
	}

	#[test]
	fn builtin_lookup() {
		assert_eq!(builtin("moonshot").map(|d| d.name), Some("Moonshot"));
		assert!(builtin("unknown").is_none());
	}

	#[tokio::test]
	async fn sends_bearer_key_and_parses_body() {
		let mut server = mockito::Server::new_async().await;
		let mock = server
			.mock("GET", "/user/balance")
			.match_header("authorization", "Bearer sk-test")
			.with_status(200)
			.with_header("content-type", "application/json")
			.with_body(r#"{"is_available":true,"balance_infos":[{"currency":"CNY","total_balance":"42.50","granted_balance":"2.50","topped_up_balance":"40.00"}]}"#)
			.create_async()
			.await;

		let creds = StaticCredentials::new();
		creds.set("deepseek", "sk-test");
		let info = backend(&server, &creds).query_balance("deepseek").await.unwrap();

		mock.assert_async().await;
		assert_eq!(info.balance, 42.5);
		assert_eq!(info.currency, "CNY");
		assert_eq!(info.paid, Some(40.0));
		assert_eq!(info.granted, Some(2.5));
	}

	#[tokio::test]
	async fn non_success_status_is_reported() {
		let mut server = mockito::Server::new_async().await;
		let _mock = server
			.mock("GET", "/user/balance")
			.with_status(401)
			.with_body("Authentication Fails (no such user)")
			.create_async()
			.await;

		let creds = StaticCredentials::new();
		creds.set("deepseek", "sk-bad");
		let err = backend(&server, &creds).query_balance("deepseek").await.unwrap_err();
		assert_eq!(
			err,
			QueryError::Status {
				status: 401,
				body: "Authentication Fails (no such user)".into()
			}
		);
	}

	#[tokio::test]
	async fn missing_key_skips_the_request() {
		let mut server = mockito::Server::new_async().await;
		let mock = server.mock("GET", "/user/balance").expect(0).create_async().await;

		let err = backend(&server, &StaticCredentials::new()).query_balance("deepseek").await.unwrap_err();
		assert_eq!(err, QueryError::MissingCredential("deepseek".into()));
		mock.assert_async().await;
	}

	#[tokio::test]
	async fn non_json_body_is_malformed() {
		let mut server = mockito::Server::new_async().await;
		let _mock = server.mock("GET", "/user/balance").with_status(200).with_body("<html>").create_async().await;

		let creds = StaticCredentials::new();
		creds.set("deepseek", "sk-test");
		let err = backend(&server, &creds).query_balance("deepseek").await.unwrap_err();
		assert!(matches!(err, QueryError::Malformed(_)));
	}
}
