//! Cost engine (component A): price a `Usage` against a `ModelPrice` table.
//!
//! Shaped after the teacher's `PricingTable::calculate_cost`
//! (`daemon/llm_gateway/metrics.rs`) — derive a quantity per item code,
//! multiply by a per-unit rate — generalized to the three `Pricing` modes
//! and kept exact with `rust_decimal::Decimal` throughout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::price::{
    Pricing, ITEM_COMPLETION, ITEM_PROMPT_CACHED_TOKEN, ITEM_USAGE, ITEM_WRITE_CACHED_TOKENS,
};
use crate::model::{ModelPrice, Usage};

const MILLION: i64 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierContribution {
    pub up_to: Option<i64>,
    pub quantity: i64,
    pub price_per_million: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostItem {
    pub item_code: String,
    pub quantity: i64,
    pub subtotal: Decimal,
    pub tier_breakdown: Vec<TierContribution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub items: Vec<CostItem>,
    pub total: Decimal,
}

fn quantity_for(item_code: &str, usage: &Usage) -> i64 {
    match item_code {
        ITEM_USAGE => {
            (usage.prompt_tokens - usage.cached_tokens - usage.write_cached_tokens).max(0)
        }
        ITEM_COMPLETION => usage.completion_tokens,
        ITEM_PROMPT_CACHED_TOKEN => usage.cached_tokens,
        ITEM_WRITE_CACHED_TOKENS => usage.write_cached_tokens,
        _ => 0,
    }
}

fn price_tiered(quantity: i64, tiers: &[crate::model::price::TierStep]) -> (Decimal, Vec<TierContribution>) {
    let mut breakdown = Vec::with_capacity(tiers.len());
    let mut subtotal = Decimal::ZERO;
    let mut prev_upper: i64 = 0;
    for tier in tiers {
        let upper = tier.up_to.unwrap_or(i64::MAX);
        let band_qty = (quantity.min(upper) - prev_upper).max(0);
        let band_subtotal = if band_qty > 0 {
            Decimal::from(band_qty) / Decimal::from(MILLION) * tier.price_per_million
        } else {
            Decimal::ZERO
        };
        breakdown.push(TierContribution {
            up_to: tier.up_to,
            quantity: band_qty,
            price_per_million: tier.price_per_million,
            subtotal: band_subtotal,
        });
        subtotal += band_subtotal;
        if quantity <= upper {
            break;
        }
        prev_upper = upper;
    }
    (subtotal, breakdown)
}

/// Prices every item of `price` against `usage`. Item codes not present in
/// `price` are skipped entirely (not represented as zero-subtotal items).
pub fn compute_cost(usage: &Usage, price: &ModelPrice) -> CostBreakdown {
    let mut items = Vec::with_capacity(price.items.len());
    let mut total = Decimal::ZERO;

    for price_item in &price.items {
        let quantity = quantity_for(&price_item.item_code, usage);
        let (subtotal, tier_breakdown) = match &price_item.pricing {
            Pricing::FlatFee { amount } => (*amount, Vec::new()),
            Pricing::UsagePerUnit { price_per_million } => (
                Decimal::from(quantity) / Decimal::from(MILLION) * price_per_million,
                Vec::new(),
            ),
            Pricing::Tiered { tiers } => price_tiered(quantity, tiers),
        };
        total += subtotal;
        items.push(CostItem {
            item_code: price_item.item_code.clone(),
            quantity,
            subtotal,
            tier_breakdown,
        });
    }

    CostBreakdown { items, total }
}
