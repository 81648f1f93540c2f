use serde_json::Value;

use super::{ProviderDef, optional_number, required_number};
use crate::{BalanceInfo, DEFAULT_CURRENCY, QueryError, Result};

pub static SILICONFLOW: ProviderDef = ProviderDef {
	id: "siliconflow",
	name: "SiliconFlow",
	base_url: "https://api.siliconflow.cn",
	balance_path: "/v1/user/info",
	parse,
};

/// `{"data": {"totalBalance", "chargeBalance", "balance"}}` with string amounts.
///
/// `balance` is the granted part, `chargeBalance` the paid part.
fn parse(body: &Value) -> Result<BalanceInfo> {
	let data = body.get("data").filter(|d| d.is_object()).ok_or_else(|| QueryError::Malformed("missing `data`".into()))?;
	Ok(BalanceInfo::new(required_number(data, "totalBalance")?, DEFAULT_CURRENCY)
		.with_split(optional_number(data, "chargeBalance"), optional_number(data, "balance")))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn reads_string_amounts() {
		let body = json!({
			"code": 20000,
			"message": "OK",
			"status": true,
			"data": {"id": "u1", "balance": "0.88", "chargeBalance": "88.00", "totalBalance": "88.88"}
		});
		let info = parse(&body).unwrap();
		assert_eq!(info.balance, 88.88);
		assert_eq!(info.paid, Some(88.0));
		assert_eq!(info.granted, Some(0.88));
	}

	#[test]
	fn missing_total_is_malformed() {
		let body = json!({"data": {"balance": "1"}});
		assert!(matches!(parse(&body), Err(QueryError::Malformed(msg)) if msg.contains("totalBalance")));
	}
}
