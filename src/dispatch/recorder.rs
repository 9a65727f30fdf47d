//! Request recorder (component F): persist request + per-attempt execution
//! rows and classify terminal status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::request::{ExecutionStatus, LatencyMetrics, RequestStatus};
use crate::model::{Request, RequestExecution, Usage, UsageLog};

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn create_request(&self, req: Request) -> Result<i64>;
    async fn set_request_channel(&self, request_id: i64, channel_id: i64) -> Result<()>;
    async fn complete_request(&self, request_id: i64, metrics: LatencyMetrics) -> Result<()>;
    async fn fail_request(&self, request_id: i64) -> Result<()>;
    async fn cancel_request(&self, request_id: i64) -> Result<()>;
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(&self, execution: RequestExecution) -> Result<i64>;
    async fn complete_execution(&self, execution_id: i64, metrics: LatencyMetrics) -> Result<()>;
    async fn fail_execution(&self, execution_id: i64, canceled: bool) -> Result<()>;
}

#[async_trait]
pub trait UsageLogStore: Send + Sync {
    async fn insert_usage_log(&self, log: UsageLog) -> Result<()>;
}

/// Groups the three stores the recorder needs, following the same
/// "one trait per concern, one implementor backs all three" grouping the
/// teacher uses for `Provider` (name/type/health/complete on one object).
pub trait RecorderStore: RequestStore + ExecutionStore + UsageLogStore {}
impl<T: RequestStore + ExecutionStore + UsageLogStore> RecorderStore for T {}

pub struct Recorder<'a> {
    pub store: &'a dyn RecorderStore,
}

impl<'a> Recorder<'a> {
    pub fn new(store: &'a dyn RecorderStore) -> Self {
        Self { store }
    }

    pub async fn accept(
        &self,
        model_id: String,
        body: Vec<u8>,
        stream: bool,
        api_key_id: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.store
            .create_request(Request {
                id: 0,
                model_id,
                body,
                status: RequestStatus::Processing,
                channel_id: None,
                stream,
                metrics: LatencyMetrics::default(),
                api_key_id,
                created_at: now,
                updated_at: now,
            })
            .await
    }

    pub async fn before_attempt(
        &self,
        request_id: i64,
        channel_id: i64,
        upstream_model_id: String,
        upstream_body: Vec<u8>,
        stream: bool,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.store.set_request_channel(request_id, channel_id).await?;
        self.store
            .create_execution(RequestExecution {
                id: 0,
                request_id,
                channel_id,
                upstream_model_id,
                body: upstream_body,
                status: ExecutionStatus::Pending,
                stream,
                metrics: LatencyMetrics::default(),
                created_at: now,
                updated_at: now,
            })
            .await
    }

    pub async fn attempt_succeeded(
        &self,
        execution_id: i64,
        metrics: LatencyMetrics,
        usage_log: Option<UsageLog>,
    ) -> Result<()> {
        self.store.complete_execution(execution_id, metrics).await?;
        if let Some(log) = usage_log {
            self.store.insert_usage_log(log).await?;
        }
        Ok(())
    }

    pub async fn attempt_failed(&self, execution_id: i64, canceled: bool) -> Result<()> {
        self.store.fail_execution(execution_id, canceled).await
    }

    pub async fn terminal_success(&self, request_id: i64, metrics: LatencyMetrics) -> Result<()> {
        self.store.complete_request(request_id, metrics).await
    }

    pub async fn terminal_failure(&self, request_id: i64, canceled: bool) -> Result<()> {
        if canceled {
            self.store.cancel_request(request_id).await
        } else {
            self.store.fail_request(request_id).await
        }
    }
}

/// Builds the cost-priced `UsageLog` row for a successful attempt.
pub fn usage_log_for(
    request_id: i64,
    api_key_id: i64,
    channel_id: i64,
    model_id: String,
    usage: &Usage,
    total_cost: rust_decimal::Decimal,
    now: DateTime<Utc>,
) -> UsageLog {
    UsageLog {
        request_id,
        api_key_id,
        channel_id,
        model_id,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        prompt_cached_tokens: usage.cached_tokens,
        prompt_write_cached_tokens: usage.write_cached_tokens,
        completion_reasoning_tokens: usage.completion_reasoning_tokens,
        completion_audio_tokens: usage.completion_audio_tokens,
        total_tokens: usage.total_tokens(),
        total_cost,
        created_at: now,
    }
}
