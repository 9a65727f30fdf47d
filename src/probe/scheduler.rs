//! Probe scheduler (component H): cron-aligned sampler that aggregates
//! per-channel request counts and derived TPS / time-to-first-token metrics.
//!
//! `lastExecutionTime` is guarded by a `parking_lot::Mutex`, matching the
//! teacher's `parking_lot::RwLock` usage in
//! `daemon/llm_gateway/metrics.rs::CostTracker`. The cron crate represents
//! the `* * * * *` tick schedule; interval alignment/truncation is
//! hand-rolled arithmetic, not a cron-parsing concern.

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::ChannelProbe;

use super::store::ProbeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeFrequency {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
}

impl ProbeFrequency {
    /// Unknown wire values are treated as `1m` (spec §6).
    pub fn from_wire(value: &str) -> Self {
        match value {
            "5m" => Self::FiveMinutes,
            "30m" => Self::ThirtyMinutes,
            "1h" => Self::OneHour,
            _ => Self::OneMinute,
        }
    }

    pub fn interval_minutes(self) -> i64 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelProbeSetting {
    pub enabled: bool,
    pub frequency: ProbeFrequency,
}

/// Truncates `now` to the nearest preceding `interval_minutes` boundary
/// (spec §4.H step 2).
pub fn truncate(now: DateTime<Utc>, interval_minutes: i64) -> DateTime<Utc> {
    let epoch_minutes = now.timestamp() / 60;
    let aligned_minutes = (epoch_minutes / interval_minutes) * interval_minutes;
    Utc.timestamp_opt(aligned_minutes * 60, 0).single().expect("aligned timestamp is valid")
}

pub struct ProbeScheduler {
    last_execution_time: Mutex<Option<i64>>,
}

impl Default for ProbeScheduler {
    fn default() -> Self {
        Self { last_execution_time: Mutex::new(None) }
    }
}

impl ProbeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one tick. Returns the number of probe rows inserted (0 if
    /// disabled, idempotently skipped, no enabled channels, or no channel had
    /// activity in the window).
    pub async fn tick(
        &self,
        store: &dyn ProbeStore,
        setting: &ChannelProbeSetting,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if !setting.enabled {
            return Ok(0);
        }

        let interval = setting.frequency.interval_minutes();
        let aligned = truncate(now, interval);
        let aligned_unix = aligned.timestamp();

        {
            let mut last = self.last_execution_time.lock();
            if *last == Some(aligned_unix) {
                return Ok(0);
            }
            *last = Some(aligned_unix);
        }

        let channels = store.enabled_channels().await?;
        if channels.is_empty() {
            return Ok(0);
        }
        let channel_ids: Vec<i64> = channels.iter().map(|c| c.id).collect();

        let window_start = aligned - Duration::minutes(interval);
        let window_end = aligned;

        let counts = store.execution_counts(&channel_ids, window_start, window_end).await?;
        let latencies = store.latency_sums(&channel_ids, window_start, window_end).await?;
        let tokens = store.completion_tokens(&channel_ids, window_start, window_end).await?;

        let probes: Vec<ChannelProbe> = channel_ids
            .into_iter()
            .filter_map(|channel_id| {
                let c = counts.get(&channel_id).copied().unwrap_or(super::store::ExecutionCounts { total: 0, success: 0 });
                if c.total == 0 {
                    return None;
                }
                let latency = latencies.get(&channel_id).copied().unwrap_or_default();
                let completion_tokens = tokens.get(&channel_id).copied().unwrap_or(0);

                let avg_tokens_per_second = if completion_tokens > 0 && latency.total_latency_ms > 0 {
                    Some(completion_tokens as f64 / (latency.total_latency_ms as f64 / 1000.0))
                } else {
                    None
                };
                let avg_time_to_first_token_ms = if latency.streaming_count > 0 {
                    Some(latency.total_first_token_latency_ms as f64 / latency.streaming_count as f64)
                } else {
                    None
                };

                Some(ChannelProbe {
                    channel_id,
                    timestamp: aligned_unix,
                    total_request_count: c.total,
                    success_request_count: c.success,
                    avg_tokens_per_second,
                    avg_time_to_first_token_ms,
                })
            })
            .collect();

        if probes.is_empty() {
            return Ok(0);
        }

        let count = probes.len();
        store.insert_probes(probes).await?;
        tracing::debug!(aligned_unix, count, "probe tick inserted rows");
        Ok(count)
    }
}

/// Strictly ascending timestamps spaced by `interval·60` seconds, ending at
/// `current_time` truncated to the interval boundary, inclusive of that
/// boundary (spec §8 property 7).
pub fn generate_timestamps(setting: &ChannelProbeSetting, current_time: DateTime<Utc>, query_range_minutes: i64) -> Vec<i64> {
    let interval = setting.frequency.interval_minutes();
    let aligned_end = truncate(current_time, interval).timestamp();
    let step_secs = interval * 60;
    let steps = (query_range_minutes / interval).max(1);
    (0..steps).map(|i| aligned_end - (steps - 1 - i) * step_secs).collect()
}

fn zero_probe(channel_id: i64, timestamp: i64) -> ChannelProbe {
    ChannelProbe {
        channel_id,
        timestamp,
        total_request_count: 0,
        success_request_count: 0,
        avg_tokens_per_second: None,
        avg_time_to_first_token_ms: None,
    }
}

/// Query-range fill: materializes zeros for timestamps with no stored probe,
/// on the reader side (spec §4.H "Query-range fill").
pub async fn query_range(
    store: &dyn ProbeStore,
    channel_id: i64,
    setting: &ChannelProbeSetting,
    now: DateTime<Utc>,
    query_range_minutes: i64,
) -> Result<Vec<ChannelProbe>> {
    let timestamps = generate_timestamps(setting, now, query_range_minutes);
    let start = *timestamps.first().expect("generate_timestamps never returns empty");
    let end = *timestamps.last().expect("generate_timestamps never returns empty");
    let existing = store.probes_in_range(channel_id, start, end).await?;
    let by_ts: HashMap<i64, ChannelProbe> = existing.into_iter().map(|p| (p.timestamp, p)).collect();
    Ok(timestamps
        .into_iter()
        .map(|ts| by_ts.get(&ts).cloned().unwrap_or_else(|| zero_probe(channel_id, ts)))
        .collect())
}
