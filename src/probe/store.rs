//! Aggregate-query surface the probe scheduler needs (component H),
//! abstracted the same way `quota::store::QuotaStore` is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Channel, ChannelProbe};

#[derive(Debug, Clone, Copy)]
pub struct ExecutionCounts {
    pub total: i64,
    pub success: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LatencySums {
    pub total_latency_ms: i64,
    pub total_first_token_latency_ms: i64,
    pub streaming_count: i64,
}

#[async_trait]
pub trait ProbeStore: Send + Sync {
    async fn enabled_channels(&self) -> Result<Vec<Channel>>;

    /// Per-channel count of non-{pending,processing} executions and the
    /// `completed` subcount, for `channel_ids` in `[start, end)`.
    async fn execution_counts(
        &self,
        channel_ids: &[i64],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<std::collections::HashMap<i64, ExecutionCounts>>;

    /// Per-channel latency sums over `completed` executions in `[start, end)`.
    async fn latency_sums(
        &self,
        channel_ids: &[i64],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<std::collections::HashMap<i64, LatencySums>>;

    /// Per-channel `SUM(completion_tokens)` from `UsageLog` in `[start, end)`,
    /// attributed via the log's own `channel_id` (spec §4.H step 5, §9).
    async fn completion_tokens(
        &self,
        channel_ids: &[i64],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<std::collections::HashMap<i64, i64>>;

    async fn insert_probes(&self, probes: Vec<ChannelProbe>) -> Result<()>;

    /// Probe rows for `channel_id` with `timestamp` in `[start, end]`,
    /// inclusive, for the query-range-fill reader (spec §4.H).
    async fn probes_in_range(&self, channel_id: i64, start: i64, end: i64) -> Result<Vec<ChannelProbe>>;
}
