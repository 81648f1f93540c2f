use serde_json::Value;

use super::{ProviderDef, optional_number, required_number};
use crate::{BalanceInfo, DEFAULT_CURRENCY, QueryError, Result};

pub static MOONSHOT: ProviderDef = ProviderDef {
	id: "moonshot",
	name: "Moonshot",
	base_url: "https://api.moonshot.cn",
	balance_path: "/v1/users/me/balance",
	parse,
};

/// `{"data": {"available_balance", "cash_balance", "voucher_balance"}}`, always CNY.
fn parse(body: &Value) -> Result<BalanceInfo> {
	let data = body.get("data").filter(|d| d.is_object()).ok_or_else(|| QueryError::Malformed("missing `data`".into()))?;
	Ok(BalanceInfo::new(required_number(data, "available_balance")?, DEFAULT_CURRENCY)
		.with_split(optional_number(data, "cash_balance"), optional_number(data, "voucher_balance")))
}
