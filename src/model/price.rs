use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One tier of a `Tiered` pricing mode: charge up to `up_to` tokens (or
/// unboundedly, if `None`) at `price_per_million`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierStep {
    pub up_to: Option<i64>,
    pub price_per_million: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pricing {
    FlatFee { amount: Decimal },
    UsagePerUnit { price_per_million: Decimal },
    Tiered { tiers: Vec<TierStep> },
}

/// Stable item-code literals (spec §6). Unknown codes are accepted on the
/// wire but evaluate to quantity 0 in the cost engine.
pub const ITEM_USAGE: &str = "usage";
pub const ITEM_COMPLETION: &str = "completion";
pub const ITEM_PROMPT_CACHED_TOKEN: &str = "prompt_cached_token";
pub const ITEM_WRITE_CACHED_TOKENS: &str = "write_cached_tokens";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPriceItem {
    pub item_code: String,
    pub pricing: Pricing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelPrice {
    pub items: Vec<ModelPriceItem>,
}

impl ModelPrice {
    pub fn item(&self, item_code: &str) -> Option<&ModelPriceItem> {
        self.items.iter().find(|i| i.item_code == item_code)
    }
}
