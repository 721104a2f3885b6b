//! Stats computation over delivery records
//!
//! Pure functions: the service fetches the record set for a window and the
//! breaker flag, everything here is arithmetic. Keeping the math free of
//! I/O makes the window semantics directly testable.

use chrono::{DateTime, Utc};
use courier_domain::{Channel, ChannelStats, DeliveryRecord, DeliveryStatus, OverallStats, StatsPeriod};

/// Compute per-channel statistics from the records in a window
pub fn compute_channel_stats(
    channel: Channel,
    period: StatsPeriod,
    records: &[DeliveryRecord],
    circuit_tripped: bool,
    now: DateTime<Utc>,
) -> ChannelStats {
    let total_sent = records.len() as u64;
    let delivered = count_status(records, DeliveryStatus::Delivered);
    let failed = count_status(records, DeliveryStatus::Failed);
    let bounced = count_status(records, DeliveryStatus::Bounced);

    let retried = records.iter().filter(|r| r.attempts > 1).count() as u64;

    ChannelStats {
        channel,
        period,
        total_sent,
        delivered,
        failed,
        bounced,
        delivery_rate: percentage(delivered, total_sent),
        avg_delivery_time_ms: average_delivery_time_ms(records),
        retry_rate: percentage(retried, total_sent),
        circuit_tripped,
        computed_at: now,
    }
}

/// Aggregate per-channel statistics into overall totals
///
/// Average delivery time is weighted by each channel's delivered count, so a
/// busy channel dominates the mean instead of every channel counting
/// equally.
pub fn aggregate_overall(
    period: StatsPeriod,
    per_channel: Vec<ChannelStats>,
    now: DateTime<Utc>,
) -> OverallStats {
    let total_sent: u64 = per_channel.iter().map(|s| s.total_sent).sum();
    let delivered: u64 = per_channel.iter().map(|s| s.delivered).sum();
    let failed: u64 = per_channel.iter().map(|s| s.failed).sum();
    let bounced: u64 = per_channel.iter().map(|s| s.bounced).sum();

    let weighted_time: u128 = per_channel
        .iter()
        .filter_map(|s| s.avg_delivery_time_ms.map(|avg| u128::from(avg) * u128::from(s.delivered)))
        .sum();
    let weight: u64 = per_channel
        .iter()
        .filter(|s| s.avg_delivery_time_ms.is_some())
        .map(|s| s.delivered)
        .sum();
    let avg_delivery_time_ms =
        if weight == 0 { None } else { Some((weighted_time / u128::from(weight)) as u64) };

    let retried_weight: f64 =
        per_channel.iter().map(|s| s.retry_rate * s.total_sent as f64 / 100.0).sum();
    let retry_rate =
        if total_sent == 0 { 0.0 } else { retried_weight / total_sent as f64 * 100.0 };

    OverallStats {
        period,
        total_sent,
        delivered,
        failed,
        bounced,
        delivery_rate: percentage(delivered, total_sent),
        avg_delivery_time_ms,
        retry_rate,
        per_channel,
        computed_at: now,
    }
}

fn count_status(records: &[DeliveryRecord], status: DeliveryStatus) -> u64 {
    records.iter().filter(|r| r.status == status).count() as u64
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn average_delivery_time_ms(records: &[DeliveryRecord]) -> Option<u64> {
    let times: Vec<u64> = records
        .iter()
        .filter_map(|r| {
            let delivered_at = r.delivered_at?;
            let elapsed = delivered_at - r.created_at;
            u64::try_from(elapsed.num_milliseconds()).ok()
        })
        .collect();

    if times.is_empty() {
        return None;
    }

    let total: u128 = times.iter().map(|&t| u128::from(t)).sum();
    Some((total / times.len() as u128) as u64)
}
