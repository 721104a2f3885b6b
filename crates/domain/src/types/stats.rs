//! Derived statistics types and reporting rows
//!
//! Nothing here is authoritative state: every value is recomputable from the
//! delivery records and the attempt log. Computed stats are cached briefly
//! by the aggregator purely for performance.

use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::delivery::Channel;

/// Reporting period anchored to wall-clock boundaries, not rolling windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Hour,
    Day,
    Week,
    Month,
}

impl StatsPeriod {
    /// Wall-clock start of the period containing `now`
    ///
    /// Hour → top of the hour, day → midnight, week → Monday midnight,
    /// month → midnight on the first. All boundaries are UTC.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let midnight = date.and_time(NaiveTime::MIN).and_utc();

        match self {
            StatsPeriod::Hour => midnight + TimeDelta::hours(i64::from(now.hour())),
            StatsPeriod::Day => midnight,
            StatsPeriod::Week => {
                midnight - TimeDelta::days(i64::from(now.weekday().num_days_from_monday()))
            }
            StatsPeriod::Month => {
                let first = date.with_day(1).unwrap_or(date);
                first.and_time(NaiveTime::MIN).and_utc()
            }
        }
    }
}

/// Outcome totals over a window, used for breaker failure-rate arithmetic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    /// Attempts with any recorded outcome (sent, delivered, failed, bounced)
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
    pub bounced: u64,
}

impl OutcomeCounts {
    /// Failure percentage: (failed + bounced) ÷ sent × 100
    ///
    /// Zero when nothing was sent, so an idle channel never trips.
    pub fn failure_rate(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        (self.failed + self.bounced) as f64 / self.sent as f64 * 100.0
    }
}

/// Per-channel delivery statistics for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel: Channel,
    pub period: StatsPeriod,
    /// Deliveries attempted in the window, regardless of outcome
    pub total_sent: u64,
    pub delivered: u64,
    pub failed: u64,
    pub bounced: u64,
    /// Delivered ÷ total_sent × 100
    pub delivery_rate: f64,
    /// Mean time from record creation to delivery confirmation
    pub avg_delivery_time_ms: Option<u64>,
    /// Deliveries needing more than one attempt ÷ total_sent × 100
    pub retry_rate: f64,
    /// Whether the channel's breaker is currently open
    pub circuit_tripped: bool,
    pub computed_at: DateTime<Utc>,
}

/// Statistics aggregated across all channels for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub period: StatsPeriod,
    pub total_sent: u64,
    pub delivered: u64,
    pub failed: u64,
    pub bounced: u64,
    pub delivery_rate: f64,
    /// Weighted by per-channel delivered count
    pub avg_delivery_time_ms: Option<u64>,
    pub retry_rate: f64,
    pub per_channel: Vec<ChannelStats>,
    pub computed_at: DateTime<Utc>,
}

/// Snapshot row describing one outstanding scheduled retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryQueueEntry {
    pub delivery_id: Uuid,
    pub channel: Channel,
    /// Attempt count at the time the retry was scheduled
    pub attempts: u32,
    pub next_retry_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    /// Validates `window_start` for the hour period.
    ///
    /// Assertions:
    /// - Confirms the window starts at the top of the hour.
    #[test]
    fn test_window_start_hour() {
        let now = at(2025, 3, 12, 14, 37, 22);
        assert_eq!(StatsPeriod::Hour.window_start(now), at(2025, 3, 12, 14, 0, 0));
    }

    /// Validates `window_start` for the day period.
    ///
    /// Assertions:
    /// - Confirms the window starts at midnight.
    #[test]
    fn test_window_start_day() {
        let now = at(2025, 3, 12, 14, 37, 22);
        assert_eq!(StatsPeriod::Day.window_start(now), at(2025, 3, 12, 0, 0, 0));
    }

    /// Validates `window_start` for the week period.
    ///
    /// Assertions:
    /// - Confirms a Wednesday maps back to Monday midnight.
    /// - Confirms a Monday maps to its own midnight.
    #[test]
    fn test_window_start_week() {
        // 2025-03-12 is a Wednesday; the preceding Monday is 2025-03-10.
        let wednesday = at(2025, 3, 12, 14, 37, 22);
        assert_eq!(StatsPeriod::Week.window_start(wednesday), at(2025, 3, 10, 0, 0, 0));

        let monday = at(2025, 3, 10, 0, 0, 1);
        assert_eq!(StatsPeriod::Week.window_start(monday), at(2025, 3, 10, 0, 0, 0));
    }

    /// Validates `window_start` for the month period.
    ///
    /// Assertions:
    /// - Confirms the window starts at midnight on the first.
    #[test]
    fn test_window_start_month() {
        let now = at(2025, 3, 12, 14, 37, 22);
        assert_eq!(StatsPeriod::Month.window_start(now), at(2025, 3, 1, 0, 0, 0));
    }

    /// Validates `OutcomeCounts::failure_rate` arithmetic.
    ///
    /// Assertions:
    /// - Confirms 3 failed of 10 sent is 30 %.
    /// - Confirms bounces count toward the failure rate.
    /// - Confirms an idle channel reports 0 %.
    #[test]
    fn test_failure_rate() {
        let counts = OutcomeCounts { sent: 10, delivered: 7, failed: 3, bounced: 0 };
        assert!((counts.failure_rate() - 30.0).abs() < f64::EPSILON);

        let counts = OutcomeCounts { sent: 10, delivered: 6, failed: 2, bounced: 2 };
        assert!((counts.failure_rate() - 40.0).abs() < f64::EPSILON);

        let idle = OutcomeCounts::default();
        assert_eq!(idle.failure_rate(), 0.0);
    }
}
