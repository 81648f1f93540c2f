use serde::{Deserialize, Serialize};

use crate::QueryError;

/// Currency reported for providers that do not name one.
pub const DEFAULT_CURRENCY: &str = "CNY";

/// Account balance as reported by one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceInfo {
	pub balance: f64,
	pub currency: String,
	/// Portion of the balance that was paid for, when the provider splits it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub paid: Option<f64>,
	/// Portion of the balance that was granted (vouchers, trial credit).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub granted: Option<f64>,
}

impl BalanceInfo {
	pub fn new(balance: f64, currency: impl Into<String>) -> Self {
		Self {
			balance,
			currency: currency.into(),
			paid: None,
			granted: None,
		}
	}

	#[must_use]
	pub fn with_split(mut self, paid: Option<f64>, granted: Option<f64>) -> Self {
		self.paid = paid;
		self.granted = granted;
		self
	}
}

impl Default for BalanceInfo {
	fn default() -> Self {
		Self::new(0.0, DEFAULT_CURRENCY)
	}
}

/// Outcome of one query, as handed to status engines.
///
/// `success == true` is expected to carry `data`; [`QueryResult::into_result`]
/// turns a violation of that contract into [`QueryError::ContractViolation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult<T> {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl<T> QueryResult<T> {
	pub fn ok(data: T) -> Self {
		Self {
			success: true,
			data: Some(data),
			error: None,
		}
	}

	pub fn err(error: impl Into<String>) -> Self {
		Self {
			success: false,
			data: None,
			error: Some(error.into()),
		}
	}

	/// Collapses the result into a `Result`, surfacing missing data as an error.
	pub fn into_result(self) -> Result<T, String> {
		match (self.success, self.data, self.error) {
			(true, Some(data), _) => Ok(data),
			(true, None, _) => Err(QueryError::ContractViolation.to_string()),
			(false, _, Some(error)) => Err(error),
			(false, _, None) => Err("query failed".to_string()),
		}
	}
}

impl<T> From<crate::Result<T>> for QueryResult<T> {
	fn from(result: crate::Result<T>) -> Self {
		match result {
			Ok(data) => Self::ok(data),
			Err(error) => Self::err(error.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn success_without_data_is_a_contract_violation() {
		let result = QueryResult::<BalanceInfo> {
			success: true,
			data: None,
			error: None,
		};
		assert_eq!(result.into_result(), Err("backend reported success without data".to_string()));
	}

	#[test]
	fn failure_keeps_backend_message() {
		let result: QueryResult<BalanceInfo> = Err(QueryError::Status {
			status: 401,
			body: "invalid key".into(),
		})
		.into();
		assert!(!result.success);
		assert_eq!(result.into_result(), Err("HTTP 401: invalid key".to_string()));
	}

	#[test]
	fn optional_split_is_omitted_from_json() {
		let json = serde_json::to_value(BalanceInfo::new(42.5, "CNY")).unwrap();
		assert_eq!(json, serde_json::json!({"balance": 42.5, "currency": "CNY"}));
	}
}
