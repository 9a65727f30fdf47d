//! Aggregate-query surface the quota engine needs (component E), abstracted
//! as a trait the way the teacher abstracts `Provider`
//! (`daemon/llm_gateway/providers/mod.rs`) — an in-memory fake backs unit
//! tests, `crate::store::sqlite` backs integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::Result;

use super::window::Window;

#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn count_requests(&self, api_key_id: i64, window: Window) -> Result<i64>;
    async fn sum_total_tokens(&self, api_key_id: i64, window: Window) -> Result<i64>;
    async fn sum_total_cost(&self, api_key_id: i64, window: Window) -> Result<Decimal>;
}

#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub api_key_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UsageLogRecord {
    pub api_key_id: i64,
    pub total_tokens: i64,
    pub total_cost: Decimal,
    pub created_at: DateTime<Utc>,
}

/// In-memory `QuotaStore` backing unit tests, mirroring the shape of the
/// in-memory fakes the teacher's provider tests build inline.
#[derive(Debug, Default)]
pub struct InMemoryQuotaStore {
    pub requests: parking_lot::Mutex<Vec<RequestRecord>>,
    pub usage_logs: parking_lot::Mutex<Vec<UsageLogRecord>>,
}

fn in_window(ts: DateTime<Utc>, window: Window) -> bool {
    window.start.is_none_or(|s| ts >= s) && window.end.is_none_or(|e| ts < e)
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn count_requests(&self, api_key_id: i64, window: Window) -> Result<i64> {
        let requests = self.requests.lock();
        Ok(requests
            .iter()
            .filter(|r| r.api_key_id == api_key_id && in_window(r.created_at, window))
            .count() as i64)
    }

    async fn sum_total_tokens(&self, api_key_id: i64, window: Window) -> Result<i64> {
        let logs = self.usage_logs.lock();
        Ok(logs
            .iter()
            .filter(|l| l.api_key_id == api_key_id && in_window(l.created_at, window))
            .map(|l| l.total_tokens)
            .sum())
    }

    async fn sum_total_cost(&self, api_key_id: i64, window: Window) -> Result<Decimal> {
        let logs = self.usage_logs.lock();
        Ok(logs
            .iter()
            .filter(|l| l.api_key_id == api_key_id && in_window(l.created_at, window))
            .map(|l| l.total_cost)
            .sum())
    }
}
