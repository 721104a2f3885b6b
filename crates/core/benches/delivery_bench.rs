//! Delivery core benchmarks
//!
//! Benchmarks for the hot paths that run on every tracked outcome: backoff
//! delay computation, breaker outcome recording, and stats aggregation over
//! a window of records.
//!
//! Run with: `cargo bench --bench delivery_bench -p courier-core`

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use courier_common::SystemClock;
use courier_core::delivery::stats::{aggregate_overall, compute_channel_stats};
use courier_core::CircuitBreakerManager;
use courier_domain::{
    BackoffKind, Channel, DeliveryRecord, DeliveryRule, DeliveryStatus, OutcomeCounts,
    StatsPeriod,
};
use uuid::Uuid;

fn bench_retry_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("retry_delay");

    for backoff in [BackoffKind::Fixed, BackoffKind::Exponential, BackoffKind::Linear] {
        let mut rule = DeliveryRule::default_for(Channel::Email);
        rule.backoff = backoff;

        group.bench_with_input(
            BenchmarkId::from_parameter(backoff),
            &rule,
            |b, rule| {
                b.iter(|| {
                    for attempts in 1..=5u32 {
                        black_box(rule.retry_delay(black_box(attempts)));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_breaker_record_outcome(c: &mut Criterion) {
    let mut group = c.benchmark_group("breaker_record_outcome");
    let rule = DeliveryRule::default_for(Channel::Email);

    group.bench_function("delivered_closed", |b| {
        let manager = CircuitBreakerManager::new(Arc::new(SystemClock));
        let counts = OutcomeCounts { sent: 100, delivered: 95, failed: 5, bounced: 0 };
        b.iter(|| {
            manager.record_outcome(
                Channel::Email,
                DeliveryStatus::Delivered,
                black_box(&counts),
                &rule,
            );
        });
    });

    group.bench_function("failed_below_threshold", |b| {
        let manager = CircuitBreakerManager::new(Arc::new(SystemClock));
        let counts = OutcomeCounts { sent: 100, delivered: 95, failed: 5, bounced: 0 };
        b.iter(|| {
            manager.record_outcome(
                Channel::Email,
                DeliveryStatus::Failed,
                black_box(&counts),
                &rule,
            );
        });
    });

    group.finish();
}

fn bench_stats_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats_aggregation");

    for size in [100usize, 1_000] {
        let now = Utc::now();
        let records: Vec<DeliveryRecord> = (0..size)
            .map(|i| {
                let mut record = DeliveryRecord::new(Uuid::new_v4(), "user-1", Channel::Email);
                record.attempts = (i % 3 + 1) as u32;
                record.status = match i % 5 {
                    0 => DeliveryStatus::Failed,
                    1 => DeliveryStatus::Bounced,
                    _ => DeliveryStatus::Delivered,
                };
                if record.status == DeliveryStatus::Delivered {
                    record.delivered_at =
                        Some(record.created_at + TimeDelta::milliseconds(150));
                }
                record
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("channel", size),
            &records,
            |b, records| {
                b.iter(|| {
                    black_box(compute_channel_stats(
                        Channel::Email,
                        StatsPeriod::Day,
                        black_box(records),
                        false,
                        now,
                    ));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("overall", size),
            &records,
            |b, records| {
                b.iter(|| {
                    let per_channel = Channel::ALL
                        .iter()
                        .map(|&channel| {
                            compute_channel_stats(
                                channel,
                                StatsPeriod::Day,
                                black_box(records),
                                false,
                                now,
                            )
                        })
                        .collect();
                    black_box(aggregate_overall(StatsPeriod::Day, per_channel, now));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_retry_delay,
    bench_breaker_record_outcome,
    bench_stats_aggregation
);
criterion_main!(benches);
