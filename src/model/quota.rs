use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Hour,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarUnit {
    Day,
    Month,
}

/// Quota period spec (spec §3/§4.B).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuotaPeriod {
    AllTime,
    PastDuration { value: i64, unit: DurationUnit },
    CalendarDuration { unit: CalendarUnit },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyQuota {
    pub period: QuotaPeriod,
    #[serde(default)]
    pub requests: Option<i64>,
    #[serde(default)]
    pub total_tokens: Option<i64>,
    #[serde(default)]
    pub cost: Option<Decimal>,
}
