use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub total_latency_ms: Option<i64>,
    pub first_token_latency_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    pub model_id: String,
    pub body: Vec<u8>,
    pub status: RequestStatus,
    pub channel_id: Option<i64>,
    pub stream: bool,
    pub metrics: LatencyMetrics,
    pub api_key_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestExecution {
    pub id: i64,
    pub request_id: i64,
    pub channel_id: i64,
    pub upstream_model_id: String,
    pub body: Vec<u8>,
    pub status: ExecutionStatus,
    pub stream: bool,
    pub metrics: LatencyMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
