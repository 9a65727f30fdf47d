//! Quota window calculator (component B): map a `QuotaPeriod` to a concrete
//! `[start, end)` window in a configured time zone.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{GatewayError, Result};
use crate::model::quota::{CalendarUnit, DurationUnit, QuotaPeriod};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    pub const ALL_TIME: Window = Window { start: None, end: None };
}

/// Computes the concrete window for `period` as of `now`, in `location`.
pub fn quota_window(now: DateTime<Utc>, period: &QuotaPeriod, location: Tz) -> Result<Window> {
    match period {
        QuotaPeriod::AllTime => Ok(Window::ALL_TIME),

        QuotaPeriod::PastDuration { value, unit } => {
            if *value <= 0 {
                return Err(GatewayError::InvalidQuotaPeriod(format!(
                    "past-duration value must be > 0, got {value}"
                )));
            }
            let delta = match unit {
                DurationUnit::Hour => Duration::hours(*value),
                DurationUnit::Day => Duration::days(*value),
            };
            Ok(Window { start: Some(now - delta), end: None })
        }

        QuotaPeriod::CalendarDuration { unit } => {
            let local_now = now.with_timezone(&location);
            match unit {
                CalendarUnit::Day => {
                    let midnight = local_now
                        .date_naive()
                        .and_hms_opt(0, 0, 0)
                        .expect("valid midnight");
                    let start_local = location
                        .from_local_datetime(&midnight)
                        .single()
                        .ok_or_else(|| GatewayError::InvalidQuotaPeriod("ambiguous local midnight".into()))?;
                    let start = start_local.with_timezone(&Utc);
                    Ok(Window { start: Some(start), end: Some(start + Duration::hours(24)) })
                }
                CalendarUnit::Month => {
                    let today = local_now.date_naive();
                    let first_of_month = today
                        .with_day(1)
                        .expect("day 1 always valid")
                        .and_hms_opt(0, 0, 0)
                        .expect("valid midnight");
                    let start_local = location
                        .from_local_datetime(&first_of_month)
                        .single()
                        .ok_or_else(|| GatewayError::InvalidQuotaPeriod("ambiguous local month start".into()))?;
                    let start = start_local.with_timezone(&Utc);

                    let (next_year, next_month) = if first_of_month.month() == 12 {
                        (first_of_month.year() + 1, 1)
                    } else {
                        (first_of_month.year(), first_of_month.month() + 1)
                    };
                    let next_month_naive = chrono::NaiveDate::from_ymd_opt(next_year, next_month, 1)
                        .expect("valid next-month date")
                        .and_hms_opt(0, 0, 0)
                        .expect("valid midnight");
                    let end_local = location
                        .from_local_datetime(&next_month_naive)
                        .single()
                        .ok_or_else(|| GatewayError::InvalidQuotaPeriod("ambiguous local next-month start".into()))?;
                    let end = end_local.with_timezone(&Utc);
                    Ok(Window { start: Some(start), end: Some(end) })
                }
            }
        }
    }
}
