//! Integration tests for the SQLite-backed store against an in-memory
//! database: request/execution lifecycle, usage-log accounting, and quota
//! aggregates all round-trip through real SQL rather than fakes.

use chrono::{TimeZone, Utc};
use llmgate::dispatch::recorder::{ExecutionStore, RequestStore, UsageLogStore};
use llmgate::model::request::{ExecutionStatus, LatencyMetrics, RequestStatus};
use llmgate::model::{Request, RequestExecution, UsageLog};
use llmgate::quota::{QuotaStore, Window};
use llmgate::store::SqliteStore;
use rust_decimal_macros::dec;

async fn store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
}

fn request(api_key_id: i64, created_at: chrono::DateTime<Utc>) -> Request {
    Request {
        id: 0,
        model_id: "rerank-v1".into(),
        body: b"{}".to_vec(),
        status: RequestStatus::Processing,
        channel_id: None,
        stream: false,
        metrics: LatencyMetrics::default(),
        api_key_id,
        created_at,
        updated_at: created_at,
    }
}

#[tokio::test]
async fn request_lifecycle_round_trips() {
    let store = store().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap();

    let request_id = store.create_request(request(1, now)).await.unwrap();
    store.set_request_channel(request_id, 7).await.unwrap();
    store
        .complete_request(request_id, LatencyMetrics { total_latency_ms: Some(120), first_token_latency_ms: None })
        .await
        .unwrap();

    let row = store.get_request(request_id).await.unwrap().unwrap();
    assert_eq!(row.channel_id, Some(7));
    assert_eq!(row.status, RequestStatus::Completed);
    assert_eq!(row.metrics.total_latency_ms, Some(120));
}

#[tokio::test]
async fn failed_and_canceled_requests_are_distinguishable() {
    let store = store().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap();

    let failed_id = store.create_request(request(1, now)).await.unwrap();
    store.fail_request(failed_id).await.unwrap();
    assert_eq!(store.get_request(failed_id).await.unwrap().unwrap().status, RequestStatus::Failed);

    let canceled_id = store.create_request(request(1, now)).await.unwrap();
    store.cancel_request(canceled_id).await.unwrap();
    assert_eq!(store.get_request(canceled_id).await.unwrap().unwrap().status, RequestStatus::Canceled);
}

#[tokio::test]
async fn execution_rows_attach_to_their_request() {
    let store = store().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap();
    let request_id = store.create_request(request(1, now)).await.unwrap();

    let execution_id = store
        .create_execution(RequestExecution {
            id: 0,
            request_id,
            channel_id: 3,
            upstream_model_id: "rerank-v1".into(),
            body: b"{}".to_vec(),
            status: ExecutionStatus::Pending,
            stream: false,
            metrics: LatencyMetrics::default(),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    store
        .complete_execution(execution_id, LatencyMetrics { total_latency_ms: Some(50), first_token_latency_ms: None })
        .await
        .unwrap();

    let executions = store.list_executions(request_id).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Completed);
    assert_eq!(executions[0].channel_id, 3);
}

#[tokio::test]
async fn usage_logs_feed_quota_aggregates() {
    let store = store().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap();
    let request_id = store.create_request(request(1, now)).await.unwrap();

    store
        .insert_usage_log(UsageLog {
            request_id,
            api_key_id: 1,
            channel_id: 3,
            model_id: "rerank-v1".into(),
            prompt_tokens: 1000,
            completion_tokens: 200,
            prompt_cached_tokens: 0,
            prompt_write_cached_tokens: 0,
            completion_reasoning_tokens: 0,
            completion_audio_tokens: 0,
            total_tokens: 1200,
            total_cost: dec!(0.42),
            created_at: now,
        })
        .await
        .unwrap();

    let logs = store.list_usage_logs(request_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].total_cost, dec!(0.42));

    let total_tokens = QuotaStore::sum_total_tokens(&store, 1, Window::ALL_TIME).await.unwrap();
    assert_eq!(total_tokens, 1200);
    let total_cost = QuotaStore::sum_total_cost(&store, 1, Window::ALL_TIME).await.unwrap();
    assert_eq!(total_cost, dec!(0.42));
    let requests = QuotaStore::count_requests(&store, 1, Window::ALL_TIME).await.unwrap();
    assert_eq!(requests, 1);
}

#[tokio::test]
async fn quota_window_excludes_entries_outside_bounds() {
    let store = store().await;
    let inside = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap();
    let outside = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    let inside_id = store.create_request(request(9, inside)).await.unwrap();
    let outside_id = store.create_request(request(9, outside)).await.unwrap();
    assert_ne!(inside_id, outside_id);

    let window = Window {
        start: Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
        end: Some(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()),
    };
    let count = QuotaStore::count_requests(&store, 9, window).await.unwrap();
    assert_eq!(count, 1);
}
