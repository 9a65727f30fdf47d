use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw token usage reported by an upstream completion (spec §4.A input).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    #[serde(default)]
    pub cached_tokens: i64,
    #[serde(default)]
    pub write_cached_tokens: i64,
    #[serde(default)]
    pub completion_reasoning_tokens: i64,
    #[serde(default)]
    pub completion_audio_tokens: i64,
}

impl Usage {
    pub fn total_tokens(&self) -> i64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Per-request token/cost accounting row (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLog {
    pub request_id: i64,
    pub api_key_id: i64,
    pub channel_id: i64,
    pub model_id: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub prompt_cached_tokens: i64,
    pub prompt_write_cached_tokens: i64,
    pub completion_reasoning_tokens: i64,
    pub completion_audio_tokens: i64,
    pub total_tokens: i64,
    pub total_cost: Decimal,
    pub created_at: DateTime<Utc>,
}
