//! Quota engine (component E): admit/deny an API key against its quota spec.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{GatewayError, Result};
use crate::model::ApiKeyQuota;

use super::store::QuotaStore;
use super::window::{quota_window, Window};

/// Which dimension denied the request, and the used/cap pair that triggered
/// it — lets a caller build a `GatewayError::QuotaExceeded` without parsing
/// `message` back apart.
#[derive(Debug, Clone)]
pub struct QuotaDenial {
    pub dimension: &'static str,
    pub used: String,
    pub cap: String,
}

#[derive(Debug, Clone)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub message: Option<String>,
    pub window: Window,
    pub denial: Option<QuotaDenial>,
}

impl QuotaCheck {
    /// Converts a denial into the typed error the dispatcher (component G)
    /// returns to the caller (spec §4.E/§7: `QuotaExceeded` → 429).
    pub fn into_error(self) -> Option<GatewayError> {
        self.denial.map(|d| GatewayError::QuotaExceeded { dimension: d.dimension.into(), used: d.used, cap: d.cap })
    }
}

/// Returns the window plus the same aggregates `check_api_key_quota` would
/// use, without enforcement (spec §4.E, used by an observability endpoint).
pub struct QuotaSnapshot {
    pub window: Window,
    pub requests: i64,
    pub total_tokens: i64,
    pub total_cost: rust_decimal::Decimal,
}

pub async fn check_api_key_quota(
    store: &dyn QuotaStore,
    api_key_id: i64,
    quota: Option<&ApiKeyQuota>,
    now: DateTime<Utc>,
    location: Tz,
) -> Result<QuotaCheck> {
    let Some(quota) = quota else {
        return Ok(QuotaCheck { allowed: true, message: None, window: Window::ALL_TIME, denial: None });
    };

    let window = quota_window(now, &quota.period, location)?;

    if let Some(cap) = quota.requests {
        let used = store.count_requests(api_key_id, window).await?;
        if used >= cap {
            tracing::info!(api_key_id, used, cap, "requests quota denied");
            return Ok(QuotaCheck {
                allowed: false,
                message: Some(format!("requests quota exceeded: {used}/{cap}")),
                window,
                denial: Some(QuotaDenial { dimension: "requests", used: used.to_string(), cap: cap.to_string() }),
            });
        }
    }

    if quota.total_tokens.is_none() && quota.cost.is_none() {
        return Ok(QuotaCheck { allowed: true, message: None, window, denial: None });
    }

    if let Some(cap) = quota.total_tokens {
        let used = store.sum_total_tokens(api_key_id, window).await?;
        if used >= cap {
            tracing::info!(api_key_id, used, cap, "total_tokens quota denied");
            return Ok(QuotaCheck {
                allowed: false,
                message: Some(format!("total_tokens quota exceeded: {used}/{cap}")),
                window,
                denial: Some(QuotaDenial { dimension: "total_tokens", used: used.to_string(), cap: cap.to_string() }),
            });
        }
    }

    if let Some(cap) = quota.cost {
        let used = store.sum_total_cost(api_key_id, window).await?;
        if used >= cap {
            tracing::info!(api_key_id, %used, %cap, "cost quota denied");
            return Ok(QuotaCheck {
                allowed: false,
                message: Some(format!("cost quota exceeded: {used}/{cap}")),
                window,
                denial: Some(QuotaDenial { dimension: "cost", used: used.to_string(), cap: cap.to_string() }),
            });
        }
    }

    Ok(QuotaCheck { allowed: true, message: None, window, denial: None })
}

pub async fn get_quota(
    store: &dyn QuotaStore,
    api_key_id: i64,
    quota: &ApiKeyQuota,
    now: DateTime<Utc>,
    location: Tz,
) -> Result<QuotaSnapshot> {
    let window = quota_window(now, &quota.period, location)?;
    let requests = store.count_requests(api_key_id, window).await?;
    let total_tokens = store.sum_total_tokens(api_key_id, window).await?;
    let total_cost = store.sum_total_cost(api_key_id, window).await?;
    Ok(QuotaSnapshot { window, requests, total_tokens, total_cost })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::quota::{DurationUnit, QuotaPeriod};
    use crate::quota::store::{InMemoryQuotaStore, RequestRecord, UsageLogRecord};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn no_quota_is_always_allowed() {
        let store = InMemoryQuotaStore::default();
        let result = check_api_key_quota(&store, 1, None, now(), chrono_tz::UTC).await.unwrap();
        assert!(result.allowed);
    }

    #[tokio::test]
    async fn s1_quota_block_on_token_cap() {
        let store = InMemoryQuotaStore::default();
        {
            let mut logs = store.usage_logs.lock();
            logs.push(UsageLogRecord { api_key_id: 1, total_tokens: 600, total_cost: dec!(0), created_at: now() });
            logs.push(UsageLogRecord { api_key_id: 1, total_tokens: 500, total_cost: dec!(0), created_at: now() });
        }
        let quota = ApiKeyQuota {
            period: QuotaPeriod::PastDuration { value: 1, unit: DurationUnit::Hour },
            requests: None,
            total_tokens: Some(1000),
            cost: None,
        };
        let result = check_api_key_quota(&store, 1, Some(&quota), now(), chrono_tz::UTC).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.message.unwrap(), "total_tokens quota exceeded: 1100/1000");
    }

    #[tokio::test]
    async fn requests_cap_denies_at_threshold() {
        let store = InMemoryQuotaStore::default();
        {
            let mut requests = store.requests.lock();
            for _ in 0..5 {
                requests.push(RequestRecord { api_key_id: 1, created_at: now() });
            }
        }
        let quota = ApiKeyQuota {
            period: QuotaPeriod::AllTime,
            requests: Some(5),
            total_tokens: None,
            cost: None,
        };
        let result = check_api_key_quota(&store, 1, Some(&quota), now(), chrono_tz::UTC).await.unwrap();
        assert!(!result.allowed);
    }

    #[tokio::test]
    async fn empty_window_yields_zero_not_error() {
        let store = InMemoryQuotaStore::default();
        let quota = ApiKeyQuota {
            period: QuotaPeriod::AllTime,
            requests: Some(10),
            total_tokens: None,
            cost: None,
        };
        let result = check_api_key_quota(&store, 1, Some(&quota), now(), chrono_tz::UTC).await.unwrap();
        assert!(result.allowed);
    }
}
