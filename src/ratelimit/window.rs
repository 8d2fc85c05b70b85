use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use std::fmt;
use std::time::Duration;

use crate::config::settings::RateLimitConfig;
use crate::store::KeyExpiry;

/// The five windows a client is measured against. Second, minute and
/// hour roll from the first request that creates the counter; day and
/// month are calendar periods in UTC, so every client resets at the same
/// wall-clock boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Second,
    Minute,
    Hour,
    Day,
    Month,
}

impl RateWindow {
    pub const fn key_segment(self) -> &'static str {
        match self {
            RateWindow::Second => "second",
            RateWindow::Minute => "minute",
            RateWindow::Hour => "hour",
            RateWindow::Day => "day",
            RateWindow::Month => "month",
        }
    }

    pub fn cap(self, config: &RateLimitConfig) -> u64 {
        match self {
            RateWindow::Second => config.per_second,
            RateWindow::Minute => config.per_minute,
            RateWindow::Hour => config.per_hour,
            RateWindow::Day => config.per_day,
            RateWindow::Month => config.per_month,
        }
    }

    /// Lifetime for a counter of this window created at `now`.
    pub fn expiry_at(self, now: DateTime<Utc>) -> KeyExpiry {
        match self {
            RateWindow::Second => KeyExpiry::After(Duration::from_secs(1)),
            RateWindow::Minute => KeyExpiry::After(Duration::from_secs(60)),
            RateWindow::Hour => KeyExpiry::After(Duration::from_secs(3600)),
            RateWindow::Day => KeyExpiry::AtMillis(end_of_day_ms(now)),
            RateWindow::Month => KeyExpiry::AtMillis(end_of_month_ms(now)),
        }
    }
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_segment())
    }
}

/// First instant of the next UTC day, in epoch milliseconds.
pub(crate) fn end_of_day_ms(now: DateTime<Utc>) -> i64 {
    let today = now.date_naive();
    let next_day = today.checked_add_days(Days::new(1)).unwrap_or(today);
    next_day.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// First instant of the next UTC month, in epoch milliseconds.
pub(crate) fn end_of_month_ms(now: DateTime<Utc>) -> i64 {
    let today = now.date_naive();
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    let next_month = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today);
    next_month.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}
