//! `sqlx::FromRow` row shapes for the tables in `schema.rs`, mapped to/from
//! the domain types in `crate::model`.
//!
//! Split file-per-concern the way the teacher splits `persistence::models`
//! from `persistence::schema`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::error::{GatewayError, Result};
use crate::model::request::{ExecutionStatus, LatencyMetrics, RequestStatus};
use crate::model::{Channel, ChannelProbe, ChannelStatus, Request, RequestExecution, UsageLog};

#[derive(Debug, FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub type_tag: String,
    pub status: String,
    pub supported_models: String,
    pub tags: String,
    pub base_url: Option<String>,
    pub models_list_url: Option<String>,
}

impl ChannelRow {
    pub fn into_domain(self) -> Result<Channel> {
        Ok(Channel {
            id: self.id,
            name: self.name,
            type_tag: self.type_tag,
            status: match self.status.as_str() {
                "enabled" => ChannelStatus::Enabled,
                "disabled" => ChannelStatus::Disabled,
                other => return Err(GatewayError::Internal(format!("unknown channel status {other}"))),
            },
            supported_models: serde_json::from_str(&self.supported_models)
                .map_err(|e| GatewayError::Internal(e.to_string()))?,
            tags: serde_json::from_str(&self.tags).map_err(|e| GatewayError::Internal(e.to_string()))?,
            base_url: self.base_url,
            models_list_url: self.models_list_url,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct RequestRow {
    pub id: i64,
    pub model_id: String,
    pub body: Vec<u8>,
    pub status: String,
    pub channel_id: Option<i64>,
    pub stream: i64,
    pub total_latency_ms: Option<i64>,
    pub first_token_latency_ms: Option<i64>,
    pub api_key_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

fn request_status_from_str(s: &str) -> Result<RequestStatus> {
    Ok(match s {
        "pending" => RequestStatus::Pending,
        "processing" => RequestStatus::Processing,
        "completed" => RequestStatus::Completed,
        "canceled" => RequestStatus::Canceled,
        "failed" => RequestStatus::Failed,
        other => return Err(GatewayError::Internal(format!("unknown request status {other}"))),
    })
}

pub fn request_status_as_str(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Processing => "processing",
        RequestStatus::Completed => "completed",
        RequestStatus::Canceled => "canceled",
        RequestStatus::Failed => "failed",
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GatewayError::Internal(e.to_string()))
}

impl RequestRow {
    pub fn into_domain(self) -> Result<Request> {
        Ok(Request {
            id: self.id,
            model_id: self.model_id,
            body: self.body,
            status: request_status_from_str(&self.status)?,
            channel_id: self.channel_id,
            stream: self.stream != 0,
            metrics: LatencyMetrics {
                total_latency_ms: self.total_latency_ms,
                first_token_latency_ms: self.first_token_latency_ms,
            },
            api_key_id: self.api_key_id,
            created_at: parse_rfc3339(&self.created_at)?,
            updated_at: parse_rfc3339(&self.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct RequestExecutionRow {
    pub id: i64,
    pub request_id: i64,
    pub channel_id: i64,
    pub upstream_model_id: String,
    pub body: Vec<u8>,
    pub status: String,
    pub stream: i64,
    pub total_latency_ms: Option<i64>,
    pub first_token_latency_ms: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

fn execution_status_from_str(s: &str) -> Result<ExecutionStatus> {
    Ok(match s {
        "pending" => ExecutionStatus::Pending,
        "processing" => ExecutionStatus::Processing,
        "completed" => ExecutionStatus::Completed,
        "failed" => ExecutionStatus::Failed,
        "canceled" => ExecutionStatus::Canceled,
        other => return Err(GatewayError::Internal(format!("unknown execution status {other}"))),
    })
}

pub fn execution_status_as_str(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Pending => "pending",
        ExecutionStatus::Processing => "processing",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Canceled => "canceled",
    }
}

impl RequestExecutionRow {
    pub fn into_domain(self) -> Result<RequestExecution> {
        Ok(RequestExecution {
            id: self.id,
            request_id: self.request_id,
            channel_id: self.channel_id,
            upstream_model_id: self.upstream_model_id,
            body: self.body,
            status: execution_status_from_str(&self.status)?,
            stream: self.stream != 0,
            metrics: LatencyMetrics {
                total_latency_ms: self.total_latency_ms,
                first_token_latency_ms: self.first_token_latency_ms,
            },
            created_at: parse_rfc3339(&self.created_at)?,
            updated_at: parse_rfc3339(&self.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct UsageLogRow {
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
    pub total_cost: String,
    pub created_at: String,
}

impl UsageLogRow {
    pub fn into_domain(self) -> Result<UsageLog> {
        Ok(UsageLog {
            request_id: self.request_id,
            api_key_id: self.api_key_id,
            channel_id: self.channel_id,
            model_id: self.model_id,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            prompt_cached_tokens: self.prompt_cached_tokens,
            prompt_write_cached_tokens: self.prompt_write_cached_tokens,
            completion_reasoning_tokens: self.completion_reasoning_tokens,
            completion_audio_tokens: self.completion_audio_tokens,
            total_tokens: self.total_tokens,
            total_cost: Decimal::from_str(&self.total_cost).map_err(|e| GatewayError::Internal(e.to_string()))?,
            created_at: parse_rfc3339(&self.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ChannelProbeRow {
    pub channel_id: i64,
    pub timestamp: i64,
    pub total_request_count: i64,
    pub success_request_count: i64,
    pub avg_tokens_per_second: Option<f64>,
    pub avg_time_to_first_token_ms: Option<f64>,
}

impl From<ChannelProbeRow> for ChannelProbe {
    fn from(row: ChannelProbeRow) -> Self {
        ChannelProbe {
            channel_id: row.channel_id,
            timestamp: row.timestamp,
            total_request_count: row.total_request_count,
            success_request_count: row.success_request_count,
            avg_tokens_per_second: row.avg_tokens_per_second,
            avg_time_to_first_token_ms: row.avg_time_to_first_token_ms,
        }
    }
}
