use serde::{Deserialize, Serialize};

/// Aggregated per-channel, per-interval datapoint (spec §3, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelProbe {
    pub channel_id: i64,
    pub timestamp: i64,
    pub total_request_count: i64,
    pub success_request_count: i64,
    pub avg_tokens_per_second: Option<f64>,
    pub avg_time_to_first_token_ms: Option<f64>,
}
