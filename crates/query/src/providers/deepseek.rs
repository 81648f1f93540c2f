use serde_json::Value;

use super::{ProviderDef, optional_number, required_number};
use crate::{BalanceInfo, DEFAULT_CURRENCY, QueryError, Result};

pub static DEEPSEEK: ProviderDef = ProviderDef {
	id: "deepseek",
	name: "DeepSeek",
	base_url: "https://api.deepseek.com",
	balance_path: "/user/balance",
	parse,
};

/// `{"balance_infos": [{"currency", "total_balance", "topped_up_balance", "granted_balance"}]}`
///
/// The first entry wins when several currencies are listed.
fn parse(body: &Value) -> Result<BalanceInfo> {
	let info = body
		.get("balance_infos")
		.and_then(Value::as_array)
		.and_then(|infos| infos.first())
		.ok_or_else(|| QueryError::Malformed("missing `balance_infos`".into()))?;

	let currency = info.get("currency").and_then(Value::as_str).unwrap_or(DEFAULT_CURRENCY);
	Ok(BalanceInfo::new(required_number(info, "total_balance")?, currency)
		.with_split(optional_number(info, "topped_up_balance"), optional_number(info, "granted_balance")))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn picks_first_currency() {
		let body = json!({
			"is_available": true,
			"balance_infos": [
				{"currency": "USD", "total_balance": "3.10", "granted_balance": "0.00", "topped_up_balance": "3.10"},
				{"currency": "CNY", "total_balance": "10.00"}
			]
		});
		let info = parse(&body).unwrap();
		assert_eq!(info.currency, "USD");
		assert_eq!(info.balance, 3.1);
		assert_eq!(info.granted, Some(0.0));
	}

	#[test]
	fn empty_list_is_malformed() {
		assert!(matches!(parse(&json!({"balance_infos": []})), Err(QueryError::Malformed(_))));
	}
}
