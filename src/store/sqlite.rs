//! SQLite-backed implementation of every `*Store` trait, following the
//! teacher's `persistence::schema::SCHEMA` + runtime `sqlx::query_as`
//! pattern. Runtime-checked queries are used throughout (no `query!`
//! macros) since this crate carries no `DATABASE_URL` to check against at
//! build time.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::dispatch::recorder::{ExecutionStore, RequestStore, UsageLogStore};
use crate::error::{GatewayError, Result};
use crate::model::request::{ExecutionStatus, LatencyMetrics, RequestStatus};
use crate::model::{Channel, ChannelProbe, Request, RequestExecution, UsageLog};
use crate::probe::store::{ExecutionCounts, LatencySums, ProbeStore};
use crate::quota::store::QuotaStore;
use crate::quota::Window;

use super::models::{
    execution_status_as_str, request_status_as_str, ChannelProbeRow, ChannelRow, RequestExecutionRow, RequestRow,
    UsageLogRow,
};

pub struct SqliteStore {
    pool: SqlitePool,
}

fn map_sqlx_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Internal(e.to_string())
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url).await.map_err(map_sqlx_err)?;
        sqlx::raw_sql(super::schema::SCHEMA).execute(&pool).await.map_err(map_sqlx_err)?;
        Ok(Self { pool })
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_request(&self, request_id: i64) -> Result<Option<Request>> {
        let row: Option<RequestRow> = sqlx::query_as("SELECT * FROM requests WHERE id = ?")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        row.map(RequestRow::into_domain).transpose()
    }

    pub async fn list_executions(&self, request_id: i64) -> Result<Vec<RequestExecution>> {
        let rows: Vec<RequestExecutionRow> =
            sqlx::query_as("SELECT * FROM request_executions WHERE request_id = ? ORDER BY id")
                .bind(request_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        rows.into_iter().map(RequestExecutionRow::into_domain).collect()
    }

    pub async fn list_usage_logs(&self, request_id: i64) -> Result<Vec<UsageLog>> {
        let rows: Vec<UsageLogRow> = sqlx::query_as("SELECT * FROM usage_logs WHERE request_id = ?")
            .bind(request_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        rows.into_iter().map(UsageLogRow::into_domain).collect()
    }
}

#[async_trait]
impl QuotaStore for SqliteStore {
    async fn count_requests(&self, api_key_id: i64, window: Window) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM requests WHERE api_key_id = ?");
        if window.start.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if window.end.is_some() {
            sql.push_str(" AND created_at < ?");
        }
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(api_key_id);
        if let Some(start) = window.start {
            query = query.bind(start.to_rfc3339());
        }
        if let Some(end) = window.end {
            query = query.bind(end.to_rfc3339());
        }
        query.fetch_one(&self.pool).await.map_err(map_sqlx_err)
    }

    async fn sum_total_tokens(&self, api_key_id: i64, window: Window) -> Result<i64> {
        let mut sql = String::from("SELECT COALESCE(SUM(total_tokens), 0) FROM usage_logs WHERE api_key_id = ?");
        if window.start.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if window.end.is_some() {
            sql.push_str(" AND created_at < ?");
        }
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(api_key_id);
        if let Some(start) = window.start {
            query = query.bind(start.to_rfc3339());
        }
        if let Some(end) = window.end {
            query = query.bind(end.to_rfc3339());
        }
        query.fetch_one(&self.pool).await.map_err(map_sqlx_err)
    }

    async fn sum_total_cost(&self, api_key_id: i64, window: Window) -> Result<Decimal> {
        let mut sql = String::from("SELECT total_cost FROM usage_logs WHERE api_key_id = ?");
        if window.start.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if window.end.is_some() {
            sql.push_str(" AND created_at < ?");
        }
        let mut query = sqlx::query_scalar::<_, String>(&sql).bind(api_key_id);
        if let Some(start) = window.start {
            query = query.bind(start.to_rfc3339());
        }
        if let Some(end) = window.end {
            query = query.bind(end.to_rfc3339());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_err)?;
        let mut total = Decimal::ZERO;
        for raw in rows {
            total += Decimal::from_str(&raw).map_err(|e| GatewayError::Internal(e.to_string()))?;
        }
        Ok(total)
    }
}

#[async_trait]
impl RequestStore for SqliteStore {
    async fn create_request(&self, req: Request) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO requests (model_id, body, status, channel_id, stream, api_key_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&req.model_id)
        .bind(&req.body)
        .bind(request_status_as_str(req.status))
        .bind(req.channel_id)
        .bind(req.stream as i64)
        .bind(req.api_key_id)
        .bind(req.created_at.to_rfc3339())
        .bind(req.updated_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(id)
    }

    async fn set_request_channel(&self, request_id: i64, channel_id: i64) -> Result<()> {
        sqlx::query("UPDATE requests SET channel_id = ? WHERE id = ?")
            .bind(channel_id)
            .bind(request_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn complete_request(&self, request_id: i64, metrics: LatencyMetrics) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        sqlx::query(
            "UPDATE requests SET status = ?, total_latency_ms = ?, first_token_latency_ms = ? WHERE id = ?",
        )
        .bind(request_status_as_str(RequestStatus::Completed))
        .bind(metrics.total_latency_ms)
        .bind(metrics.first_token_latency_ms)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn fail_request(&self, request_id: i64) -> Result<()> {
        sqlx::query("UPDATE requests SET status = ? WHERE id = ?")
            .bind(request_status_as_str(RequestStatus::Failed))
            .bind(request_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn cancel_request(&self, request_id: i64) -> Result<()> {
        sqlx::query("UPDATE requests SET status = ? WHERE id = ?")
            .bind(request_status_as_str(RequestStatus::Canceled))
            .bind(request_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for SqliteStore {
    async fn create_execution(&self, execution: RequestExecution) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO request_executions
                (request_id, channel_id, upstream_model_id, body, status, stream, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(execution.request_id)
        .bind(execution.channel_id)
        .bind(&execution.upstream_model_id)
        .bind(&execution.body)
        .bind(execution_status_as_str(execution.status))
        .bind(execution.stream as i64)
        .bind(execution.created_at.to_rfc3339())
        .bind(execution.updated_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(id)
    }

    async fn complete_execution(&self, execution_id: i64, metrics: LatencyMetrics) -> Result<()> {
        sqlx::query(
            "UPDATE request_executions SET status = ?, total_latency_ms = ?, first_token_latency_ms = ? WHERE id = ?",
        )
        .bind(execution_status_as_str(ExecutionStatus::Completed))
        .bind(metrics.total_latency_ms)
        .bind(metrics.first_token_latency_ms)
        .bind(execution_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn fail_execution(&self, execution_id: i64, canceled: bool) -> Result<()> {
        let status = if canceled { ExecutionStatus::Canceled } else { ExecutionStatus::Failed };
        sqlx::query("UPDATE request_executions SET status = ? WHERE id = ?")
            .bind(execution_status_as_str(status))
            .bind(execution_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[async_trait]
impl UsageLogStore for SqliteStore {
    async fn insert_usage_log(&self, log: UsageLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_logs
                (request_id, api_key_id, channel_id, model_id, prompt_tokens, completion_tokens,
                 prompt_cached_tokens, prompt_write_cached_tokens, completion_reasoning_tokens,
                 completion_audio_tokens, total_tokens, total_cost, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(log.request_id)
        .bind(log.api_key_id)
        .bind(log.channel_id)
        .bind(&log.model_id)
        .bind(log.prompt_tokens)
        .bind(log.completion_tokens)
        .bind(log.prompt_cached_tokens)
        .bind(log.prompt_write_cached_tokens)
        .bind(log.completion_reasoning_tokens)
        .bind(log.completion_audio_tokens)
        .bind(log.total_tokens)
        .bind(log.total_cost.to_string())
        .bind(log.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[async_trait]
impl ProbeStore for SqliteStore {
    async fn enabled_channels(&self) -> Result<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as("SELECT * FROM channels WHERE status = 'enabled'")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        rows.into_iter().map(ChannelRow::into_domain).collect()
    }

    async fn execution_counts(
        &self,
        channel_ids: &[i64],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<i64, ExecutionCounts>> {
        if channel_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = channel_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT channel_id,
                    COUNT(*) as total,
                    SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END) as success
             FROM request_executions
             WHERE status NOT IN ('pending', 'processing')
               AND channel_id IN ({placeholders})
               AND created_at >= ? AND created_at < ?
             GROUP BY channel_id"
        );
        let mut query = sqlx::query_as::<_, (i64, i64, i64)>(&sql);
        for id in channel_ids {
            query = query.bind(id);
        }
        query = query.bind(start.to_rfc3339()).bind(end.to_rfc3339());
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_err)?;
        Ok(rows.into_iter().map(|(id, total, success)| (id, ExecutionCounts { total, success })).collect())
    }

    async fn latency_sums(
        &self,
        channel_ids: &[i64],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<i64, LatencySums>> {
        if channel_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = channel_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT channel_id,
                    COALESCE(SUM(total_latency_ms), 0) as total_latency_ms,
                    COALESCE(SUM(first_token_latency_ms), 0) as total_first_token_latency_ms,
                    SUM(CASE WHEN first_token_latency_ms IS NOT NULL THEN 1 ELSE 0 END) as streaming_count
             FROM request_executions
             WHERE status = 'completed'
               AND channel_id IN ({placeholders})
               AND created_at >= ? AND created_at < ?
             GROUP BY channel_id"
        );
        let mut query = sqlx::query_as::<_, (i64, i64, i64, i64)>(&sql);
        for id in channel_ids {
            query = query.bind(id);
        }
        query = query.bind(start.to_rfc3339()).bind(end.to_rfc3339());
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, total_latency_ms, total_first_token_latency_ms, streaming_count)| {
                (id, LatencySums { total_latency_ms, total_first_token_latency_ms, streaming_count })
            })
            .collect())
    }

    async fn completion_tokens(
        &self,
        channel_ids: &[i64],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<i64, i64>> {
        if channel_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = channel_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT channel_id, COALESCE(SUM(completion_tokens), 0) as completion_tokens
             FROM usage_logs
             WHERE channel_id IN ({placeholders}) AND created_at >= ? AND created_at < ?
             GROUP BY channel_id"
        );
        let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
        for id in channel_ids {
            query = query.bind(id);
        }
        query = query.bind(start.to_rfc3339()).bind(end.to_rfc3339());
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_err)?;
        Ok(rows.into_iter().collect())
    }

    async fn insert_probes(&self, probes: Vec<ChannelProbe>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        for probe in probes {
            sqlx::query(
                "INSERT INTO channel_probes
                    (channel_id, timestamp, total_request_count, success_request_count,
                     avg_tokens_per_second, avg_time_to_first_token_ms)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(probe.channel_id)
            .bind(probe.timestamp)
            .bind(probe.total_request_count)
            .bind(probe.success_request_count)
            .bind(probe.avg_tokens_per_second)
            .bind(probe.avg_time_to_first_token_ms)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn probes_in_range(&self, channel_id: i64, start: i64, end: i64) -> Result<Vec<ChannelProbe>> {
        let rows: Vec<ChannelProbeRow> = sqlx::query_as(
            "SELECT * FROM channel_probes WHERE channel_id = ? AND timestamp >= ? AND timestamp <= ?",
        )
        .bind(channel_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(rows.into_iter().map(ChannelProbe::from).collect())
    }
}
