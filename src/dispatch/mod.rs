//! Dispatch engine (component G): validate → resolve channels → retry loop
//! → record → return.

pub mod recorder;
pub mod transformer;

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;

use crate::association;
use crate::cost::compute_cost;
use crate::error::{GatewayError, Result};
use crate::model::association::ModelAssociation;
use crate::model::request::LatencyMetrics;
use crate::model::{ApiKeyQuota, Channel, ModelPrice, Usage};
use crate::quota::engine::check_api_key_quota;
use crate::quota::store::QuotaStore;
use crate::time::Clock;

use recorder::{usage_log_for, RecorderStore};
use transformer::{HttpClient, PriceTable, RerankRequest, RerankResponse, Transformer};

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub retries_enabled: bool,
    pub max_channel_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self { retries_enabled: true, max_channel_retries: 3, retry_delay_ms: 250 }
    }
}

pub struct DispatchOutcome {
    pub response: Option<RerankResponse>,
    pub http_status: u16,
    pub error: Option<GatewayError>,
}

fn validate_rerank(request: &RerankRequest) -> Result<()> {
    if request.model.is_empty() {
        return Err(GatewayError::InvalidRequest("model must not be empty".into()));
    }
    if request.query.is_empty() {
        return Err(GatewayError::InvalidRequest("query must not be empty".into()));
    }
    if request.documents.is_empty() {
        return Err(GatewayError::InvalidRequest("at least one document is required".into()));
    }
    if request.documents.iter().any(|d| d.is_empty()) {
        return Err(GatewayError::InvalidRequest("documents must not be empty".into()));
    }
    if let Some(top_n) = request.top_n {
        if top_n == 0 || top_n > request.documents.len() {
            return Err(GatewayError::InvalidRequest(format!(
                "top_n must be in (0, {}], got {top_n}",
                request.documents.len()
            )));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn invoke_rerank(
    request: RerankRequest,
    api_key_id: i64,
    api_key_quota: Option<&ApiKeyQuota>,
    associations: &[ModelAssociation],
    channels: &[Channel],
    transformer: &dyn Transformer,
    http_client: &dyn HttpClient,
    price_table: &dyn PriceTable,
    quota_store: &dyn QuotaStore,
    store: Arc<dyn RecorderStore>,
    policy: DispatchPolicy,
    clock: &dyn Clock,
    location: Tz,
    cancel: CancellationToken,
) -> DispatchOutcome {
    let correlation_id = uuid::Uuid::new_v4();

    if let Err(e) = validate_rerank(&request) {
        tracing::warn!(%correlation_id, error = %e, "rerank request failed validation");
        return DispatchOutcome { response: None, http_status: e.http_status(), error: Some(e) };
    }

    let quota_check = match check_api_key_quota(quota_store, api_key_id, api_key_quota, clock.now(), location).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(%correlation_id, error = %e, "quota check failed");
            return DispatchOutcome { response: None, http_status: e.http_status(), error: Some(e) };
        }
    };
    if !quota_check.allowed {
        tracing::info!(%correlation_id, api_key_id, message = ?quota_check.message, "request denied by quota");
        let e = quota_check.into_error().unwrap_or(GatewayError::Internal("quota denied without denial detail".into()));
        return DispatchOutcome { response: None, http_status: e.http_status(), error: Some(e) };
    }

    let requested_model = request.model.clone();
    let candidate_channels: Vec<Channel> = channels
        .iter()
        .filter(|c| c.is_enabled() && c.supports_model(&requested_model))
        .cloned()
        .collect();

    let connections = match association::resolve(associations, &candidate_channels) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(%correlation_id, error = %e, "association resolution failed");
            return DispatchOutcome { response: None, http_status: e.http_status(), error: Some(e) };
        }
    };

    if connections.is_empty() {
        let e = GatewayError::NoChannelAvailable;
        tracing::warn!(%correlation_id, model = %requested_model, "no channel available for model");
        return DispatchOutcome { response: None, http_status: e.http_status(), error: Some(e) };
    }

    tracing::info!(%correlation_id, model = %requested_model, candidates = connections.len(), "dispatching rerank request");

    let started_at = clock.now();
    let recorder = recorder::Recorder::new(&*store);
    let request_id = match recorder
        .accept(requested_model.clone(), serde_json::to_vec(&request).unwrap_or_default(), false, api_key_id, started_at)
        .await
    {
        Ok(id) => id,
        Err(_) => 0,
    };

    let attempts = if policy.retries_enabled {
        policy.max_channel_retries.min(connections.len())
    } else {
        1
    };

    let mut last_status = 500u16;
    let mut last_error: Option<GatewayError> = None;

    for attempt in 0..attempts {
        let connection = &connections[attempt % connections.len()];
        let channel = &connection.channel;

        let upstream_model = match transformer.map_model(channel, &requested_model) {
            Ok(m) => m,
            Err(e) => {
                last_status = e.http_status();
                last_error = Some(e);
                break;
            }
        };

        let mut upstream_request = request.clone();
        upstream_request.model = upstream_model.clone();

        let execution_id = recorder
            .before_attempt(
                request_id,
                channel.id,
                upstream_model,
                serde_json::to_vec(&upstream_request).unwrap_or_default(),
                false,
                clock.now(),
            )
            .await
            .unwrap_or(0);

        let attempt_outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            r = transformer.rerank(channel, &upstream_request, http_client) => Some(r),
        };

        let Some(attempt_result) = attempt_outcome else {
            tracing::warn!(%correlation_id, channel_id = channel.id, attempt, "attempt canceled by caller");
            return cancel_in_flight(store.clone(), request_id, Some(execution_id), correlation_id).await;
        };

        match attempt_result {
            Ok((response, usage)) => {
                let metrics = LatencyMetrics {
                    total_latency_ms: Some((clock.now() - started_at).num_milliseconds()),
                    first_token_latency_ms: None,
                };
                let _ = recorder.attempt_succeeded(execution_id, metrics.clone(), None).await;
                if let Some(usage) = &usage {
                    if let Some(price) = price_table.price_for(&requested_model) {
                        if let Err(e) =
                            record_priced_usage(&*store, request_id, api_key_id, channel.id, requested_model.clone(), usage, &price, clock)
                                .await
                        {
                            tracing::warn!(%correlation_id, error = %e, "failed to record priced usage");
                        }
                    }
                }
                let _ = recorder.terminal_success(request_id, metrics).await;
                tracing::info!(%correlation_id, channel_id = channel.id, attempt, "rerank request succeeded");
                return DispatchOutcome { response: Some(response), http_status: 200, error: None };
            }
            Err(e) => {
                let _ = recorder.attempt_failed(execution_id, false).await;
                let status = e.http_status();
                tracing::warn!(%correlation_id, channel_id = channel.id, attempt, status, "channel attempt failed");
                last_status = status;
                let is_client_class = (400..500).contains(&status);
                last_error = Some(e);
                if is_client_class {
                    break;
                }
                if attempt + 1 < attempts {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            tracing::warn!(%correlation_id, "caller canceled during retry delay");
                            return cancel_in_flight(store, request_id, None, correlation_id).await;
                        }
                        _ = tokio::time::sleep(Duration::from_millis(policy.retry_delay_ms)) => {}
                    }
                }
            }
        }
    }

    let _ = recorder.terminal_failure(request_id, false).await;
    tracing::error!(%correlation_id, status = last_status, "rerank request exhausted all channel attempts");
    DispatchOutcome { response: None, http_status: last_status, error: last_error }
}

/// Handles a cancellation observed mid-retry-loop: the execution that was
/// in flight (if any) is marked canceled and the request as a whole is
/// marked canceled, both under a detached context bounded by a timeout so
/// the caller dropping its own future does not abort this bookkeeping
/// (spec §4.F/§5: "detached 5-second-bounded context").
async fn cancel_in_flight(
    store: Arc<dyn RecorderStore>,
    request_id: i64,
    in_flight_execution_id: Option<i64>,
    correlation_id: uuid::Uuid,
) -> DispatchOutcome {
    let detach_result = crate::detach::detached_with_timeout(crate::detach::DEFAULT_DETACH_TIMEOUT, async move {
        let recorder = recorder::Recorder::new(&*store);
        if let Some(execution_id) = in_flight_execution_id {
            if execution_id != 0 {
                recorder.attempt_failed(execution_id, true).await?;
            }
        }
        recorder.terminal_failure(request_id, true).await
    })
    .await;

    if let Err(e) = detach_result {
        tracing::error!(%correlation_id, error = %e, "detached cancellation bookkeeping failed");
    }

    let e = GatewayError::Canceled;
    DispatchOutcome { response: None, http_status: e.http_status(), error: Some(e) }
}

/// Prices a successful rerank attempt's usage and records the resulting
/// `UsageLog` row, wiring component A's output into component F's ledger
/// (spec §2's data-flow summary).
pub async fn record_priced_usage(
    store: &dyn RecorderStore,
    request_id: i64,
    api_key_id: i64,
    channel_id: i64,
    model_id: String,
    usage: &Usage,
    price: &ModelPrice,
    clock: &dyn Clock,
) -> Result<()> {
    use recorder::UsageLogStore;
    let breakdown = compute_cost(usage, price);
    let now = clock.now();
    store
        .insert_usage_log(usage_log_for(request_id, api_key_id, channel_id, model_id, usage, breakdown.total, now))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::request::ExecutionStatus;
    use crate::model::quota::QuotaPeriod;
    use crate::model::{Channel, ChannelStatus, Request, RequestExecution, UsageLog};
    use crate::quota::store::InMemoryQuotaStore;
    use crate::time::FixedClock;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use recorder::{ExecutionStore, RequestStore, UsageLogStore};
    use std::time::Duration as StdDuration;
    use super::transformer::RerankResult;

    struct FakeHttpClient;
    impl HttpClient for FakeHttpClient {}

    struct NoPricing;
    impl PriceTable for NoPricing {
        fn price_for(&self, _model_id: &str) -> Option<ModelPrice> {
            None
        }
    }

    /// Per-channel-id scripted response: `Ok` returns a response, `Err(status)`
    /// fails with that HTTP status.
    struct ScriptedTransformer {
        scripts: std::collections::HashMap<i64, std::result::Result<(), u16>>,
    }

    #[async_trait]
    impl Transformer for ScriptedTransformer {
        fn map_model(&self, _channel: &Channel, request_model: &str) -> Result<String> {
            Ok(request_model.to_string())
        }

        async fn rerank(
            &self,
            channel: &Channel,
            _request: &RerankRequest,
            _http: &dyn HttpClient,
        ) -> Result<(RerankResponse, Option<Usage>)> {
            match self.scripts.get(&channel.id) {
                Some(Ok(())) => Ok((RerankResponse { results: vec![RerankResult { index: 0, relevance_score: 0.9 }] }, None)),
                Some(Err(status)) => Err(GatewayError::UpstreamError { status: *status, message: "upstream error".into() }),
                None => Err(GatewayError::UpstreamError { status: 500, message: "unscripted channel".into() }),
            }
        }
    }

    /// Transformer whose `rerank` never resolves until the caller's
    /// cancellation token fires, for exercising the cancel-in-flight path.
    struct HangingTransformer;

    #[async_trait]
    impl Transformer for HangingTransformer {
        fn map_model(&self, _channel: &Channel, request_model: &str) -> Result<String> {
            Ok(request_model.to_string())
        }

        async fn rerank(&self, _channel: &Channel, _request: &RerankRequest, _http: &dyn HttpClient) -> Result<(RerankResponse, Option<Usage>)> {
            std::future::pending().await
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        requests: Mutex<Vec<Request>>,
        executions: Mutex<Vec<RequestExecution>>,
        usage_logs: Mutex<Vec<UsageLog>>,
    }

    #[async_trait]
    impl RequestStore for RecordingStore {
        async fn create_request(&self, req: Request) -> Result<i64> {
            let mut requests = self.requests.lock();
            let id = requests.len() as i64 + 1;
            let mut req = req;
            req.id = id;
            requests.push(req);
            Ok(id)
        }

        async fn set_request_channel(&self, request_id: i64, channel_id: i64) -> Result<()> {
            let mut requests = self.requests.lock();
            if let Some(r) = requests.iter_mut().find(|r| r.id == request_id) {
                r.channel_id = Some(channel_id);
            }
            Ok(())
        }

        async fn complete_request(&self, request_id: i64, metrics: LatencyMetrics) -> Result<()> {
            let mut requests = self.requests.lock();
            if let Some(r) = requests.iter_mut().find(|r| r.id == request_id) {
                r.status = crate::model::request::RequestStatus::Completed;
                r.metrics = metrics;
            }
            Ok(())
        }

        async fn fail_request(&self, request_id: i64) -> Result<()> {
            let mut requests = self.requests.lock();
            if let Some(r) = requests.iter_mut().find(|r| r.id == request_id) {
                r.status = crate::model::request::RequestStatus::Failed;
            }
            Ok(())
        }

        async fn cancel_request(&self, request_id: i64) -> Result<()> {
            let mut requests = self.requests.lock();
            if let Some(r) = requests.iter_mut().find(|r| r.id == request_id) {
                r.status = crate::model::request::RequestStatus::Canceled;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ExecutionStore for RecordingStore {
        async fn create_execution(&self, execution: RequestExecution) -> Result<i64> {
            let mut executions = self.executions.lock();
            let id = executions.len() as i64 + 1;
            let mut execution = execution;
            execution.id = id;
            executions.push(execution);
            Ok(id)
        }

        async fn complete_execution(&self, execution_id: i64, metrics: LatencyMetrics) -> Result<()> {
            let mut executions = self.executions.lock();
            if let Some(e) = executions.iter_mut().find(|e| e.id == execution_id) {
                e.status = ExecutionStatus::Completed;
                e.metrics = metrics;
            }
            Ok(())
        }

        async fn fail_execution(&self, execution_id: i64, canceled: bool) -> Result<()> {
            let mut executions = self.executions.lock();
            if let Some(e) = executions.iter_mut().find(|e| e.id == execution_id) {
                e.status = if canceled { ExecutionStatus::Canceled } else { ExecutionStatus::Failed };
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UsageLogStore for RecordingStore {
        async fn insert_usage_log(&self, log: UsageLog) -> Result<()> {
            self.usage_logs.lock().push(log);
            Ok(())
        }
    }

    fn channel(id: i64) -> Channel {
        Channel {
            id,
            name: format!("channel-{id}"),
            type_tag: "openai-fake".into(),
            status: ChannelStatus::Enabled,
            supported_models: vec!["rerank-v1".into()],
            tags: vec![],
            base_url: None,
            models_list_url: None,
        }
    }

    fn request() -> RerankRequest {
        RerankRequest {
            model: "rerank-v1".into(),
            query: "find it".into(),
            documents: vec!["doc a".into(), "doc b".into()],
            top_n: None,
        }
    }

    fn associations() -> Vec<ModelAssociation> {
        vec![ModelAssociation::Model { priority: 1, model_id: "rerank-v1".into(), exclude: vec![] }]
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        channels: &[Channel],
        transformer: &dyn Transformer,
        store: Arc<dyn RecorderStore>,
        policy: DispatchPolicy,
        clock: &dyn Clock,
        quota: Option<&ApiKeyQuota>,
        quota_store: &dyn QuotaStore,
        cancel: CancellationToken,
    ) -> DispatchOutcome {
        invoke_rerank(
            request(),
            1,
            quota,
            &associations(),
            channels,
            transformer,
            &FakeHttpClient,
            &NoPricing,
            quota_store,
            store,
            policy,
            clock,
            chrono_tz::UTC,
            cancel,
        )
        .await
    }

    #[tokio::test]
    async fn s3_retry_on_5xx_then_success() {
        let channels = vec![channel(1), channel(2), channel(3)];
        let mut scripts = std::collections::HashMap::new();
        scripts.insert(1, Err(503));
        scripts.insert(2, Ok(()));
        scripts.insert(3, Ok(()));
        let transformer = ScriptedTransformer { scripts };
        let store = Arc::new(RecordingStore::default());
        let clock = FixedClock(Utc::now());
        let quota_store = InMemoryQuotaStore::default();

        let outcome = dispatch(
            &channels,
            &transformer,
            store.clone(),
            DispatchPolicy { retries_enabled: true, max_channel_retries: 3, retry_delay_ms: 0 },
            &clock,
            None,
            &quota_store,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.http_status, 200);
        assert!(outcome.response.is_some());
        let requests = store.requests.lock();
        assert_eq!(requests[0].channel_id, Some(2));
        let executions = store.executions.lock();
        assert_eq!(executions.len(), 2);
        assert_eq!(executions[0].status, ExecutionStatus::Failed);
        assert_eq!(executions[1].status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn s4_short_circuit_on_4xx() {
        let channels = vec![channel(1), channel(2), channel(3)];
        let mut scripts = std::collections::HashMap::new();
        scripts.insert(1, Err(400));
        scripts.insert(2, Ok(()));
        scripts.insert(3, Ok(()));
        let transformer = ScriptedTransformer { scripts };
        let store = Arc::new(RecordingStore::default());
        let clock = FixedClock(Utc::now());
        let quota_store = InMemoryQuotaStore::default();

        let outcome = dispatch(
            &channels,
            &transformer,
            store.clone(),
            DispatchPolicy { retries_enabled: true, max_channel_retries: 3, retry_delay_ms: 0 },
            &clock,
            None,
            &quota_store,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.http_status, 400);
        assert!(outcome.response.is_none());
        let executions = store.executions.lock();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn retry_cap_never_exceeds_candidate_count() {
        let channels = vec![channel(1)];
        let mut scripts = std::collections::HashMap::new();
        scripts.insert(1, Err(503));
        let transformer = ScriptedTransformer { scripts };
        let store = Arc::new(RecordingStore::default());
        let clock = FixedClock(Utc::now());
        let quota_store = InMemoryQuotaStore::default();

        let outcome = dispatch(
            &channels,
            &transformer,
            store.clone(),
            DispatchPolicy { retries_enabled: true, max_channel_retries: 3, retry_delay_ms: 0 },
            &clock,
            None,
            &quota_store,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.http_status, 503);
        let executions = store.executions.lock();
        assert_eq!(executions.len(), 1);
    }

    #[tokio::test]
    async fn quota_admission_denies_before_any_channel_is_tried() {
        let channels = vec![channel(1)];
        let transformer = ScriptedTransformer { scripts: std::collections::HashMap::from([(1, Ok(()))]) };
        let store = Arc::new(RecordingStore::default());
        let clock = FixedClock(Utc::now());
        let quota_store = InMemoryQuotaStore::default();
        {
            let mut requests = quota_store.requests.lock();
            for _ in 0..5 {
                requests.push(crate::quota::store::RequestRecord { api_key_id: 1, created_at: clock.now() });
            }
        }
        let quota = ApiKeyQuota { period: QuotaPeriod::AllTime, requests: Some(5), total_tokens: None, cost: None };

        let outcome = dispatch(
            &channels,
            &transformer,
            store.clone(),
            DispatchPolicy::default(),
            &clock,
            Some(&quota),
            &quota_store,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.http_status, 429);
        assert!(matches!(outcome.error, Some(GatewayError::QuotaExceeded { .. })));
        assert!(store.requests.lock().is_empty(), "a denied request is never even accepted by the recorder");
    }

    #[tokio::test]
    async fn caller_cancellation_marks_request_and_execution_canceled() {
        let channels = vec![channel(1)];
        let transformer = HangingTransformer;
        let store = Arc::new(RecordingStore::default());
        let clock = FixedClock(Utc::now());
        let quota_store = InMemoryQuotaStore::default();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let outcome = dispatch(
            &channels,
            &transformer,
            store.clone(),
            DispatchPolicy::default(),
            &clock,
            None,
            &quota_store,
            cancel,
        )
        .await;

        assert_eq!(outcome.http_status, 499);
        assert!(matches!(outcome.error, Some(GatewayError::Canceled)));
        let requests = store.requests.lock();
        assert_eq!(requests[0].status, crate::model::request::RequestStatus::Canceled);
        let executions = store.executions.lock();
        assert_eq!(executions[0].status, ExecutionStatus::Canceled);
    }

    #[test]
    fn rejects_empty_query() {
        let mut req = request();
        req.query = String::new();
        assert!(matches!(validate_rerank(&req), Err(GatewayError::InvalidRequest(_))));
    }

    #[test]
    fn rejects_top_n_out_of_range() {
        let mut req = request();
        req.top_n = Some(0);
        assert!(matches!(validate_rerank(&req), Err(GatewayError::InvalidRequest(_))));

        let mut req = request();
        req.top_n = Some(5);
        assert!(matches!(validate_rerank(&req), Err(GatewayError::InvalidRequest(_))));
    }
}
