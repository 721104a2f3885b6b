//! Mock collaborators for delivery service tests
//!
//! Provides an in-memory mock for the `DeliveryStore` port and scripted
//! channel senders, enabling deterministic tests without infra
//! dependencies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::{ChannelSender, DeliveryStore, SendOutcome};
use courier_domain::{
    Channel, DeliveryAttempt, DeliveryRecord, DeliveryStatus, OutcomeCounts,
    Result as DomainResult,
};
use uuid::Uuid;

/// Install a test subscriber so `RUST_LOG`-filtered traces show up when a
/// test needs debugging. Safe to call from every test; only the first call
/// wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::from_default_env(),
    )
    .with_test_writer()
    .try_init();
}

/// In-memory mock for `DeliveryStore`.
///
/// Mutex-guarded maps are plenty for test volumes and keep the mock obvious.
#[derive(Default, Clone)]
pub struct MockDeliveryStore {
    records: Arc<Mutex<Vec<DeliveryRecord>>>,
    attempts: Arc<Mutex<Vec<DeliveryAttempt>>>,
}

impl MockDeliveryStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Total attempt entries across all deliveries.
    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliveryStore for MockDeliveryStore {
    async fn put_record(&self, record: DeliveryRecord) -> DomainResult<()> {
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r.id != record.id);
        records.push(record);
        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> DomainResult<Option<DeliveryRecord>> {
        Ok(self.records.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn delete_record(&self, id: Uuid) -> DomainResult<bool> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        self.attempts.lock().unwrap().retain(|a| a.delivery_id != id);
        Ok(records.len() < before)
    }

    async fn append_attempt(&self, attempt: DeliveryAttempt) -> DomainResult<()> {
        self.attempts.lock().unwrap().push(attempt);
        Ok(())
    }

    async fn attempts_for(&self, id: Uuid) -> DomainResult<Vec<DeliveryAttempt>> {
        let mut attempts: Vec<DeliveryAttempt> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.delivery_id == id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.timestamp);
        Ok(attempts)
    }

    async fn records_in_window(
        &self,
        channel: Option<Channel>,
        since: DateTime<Utc>,
    ) -> DomainResult<Vec<DeliveryRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.created_at >= since)
            .filter(|r| channel.map_or(true, |c| r.channel == c))
            .cloned()
            .collect())
    }

    async fn outcome_counts_since(
        &self,
        channel: Channel,
        since: DateTime<Utc>,
    ) -> DomainResult<OutcomeCounts> {
        let records = self.records.lock().unwrap();
        let attempts = self.attempts.lock().unwrap();
        let mut counts = OutcomeCounts::default();

        for attempt in attempts.iter().filter(|a| a.timestamp >= since) {
            let on_channel = records
                .iter()
                .any(|r| r.id == attempt.delivery_id && r.channel == channel);
            if !on_channel {
                continue;
            }

            match attempt.status {
                DeliveryStatus::Pending => {}
                DeliveryStatus::Sent => counts.sent += 1,
                DeliveryStatus::Delivered => {
                    counts.sent += 1;
                    counts.delivered += 1;
                }
                DeliveryStatus::Failed => {
                    counts.sent += 1;
                    counts.failed += 1;
                }
                DeliveryStatus::Bounced => {
                    counts.sent += 1;
                    counts.bounced += 1;
                }
            }
        }

        Ok(counts)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let mut records = self.records.lock().unwrap();
        let expired: Vec<Uuid> =
            records.iter().filter(|r| r.created_at < cutoff).map(|r| r.id).collect();

        records.retain(|r| r.created_at >= cutoff);
        self.attempts.lock().unwrap().retain(|a| !expired.contains(&a.delivery_id));
        Ok(expired.len())
    }
}

/// Scripted channel sender: fails the first `fail_first` sends, then
/// delivers.
pub struct ScriptedSender {
    fail_first: usize,
    calls: AtomicUsize,
}

impl ScriptedSender {
    /// A sender that always delivers.
    pub fn always_delivers() -> Self {
        Self { fail_first: 0, calls: AtomicUsize::new(0) }
    }

    /// A sender that never delivers.
    pub fn always_fails() -> Self {
        Self { fail_first: usize::MAX, calls: AtomicUsize::new(0) }
    }

    /// A sender that fails the first `n` sends and delivers afterwards.
    pub fn fails_first(n: usize) -> Self {
        Self { fail_first: n, calls: AtomicUsize::new(0) }
    }

    /// Number of send calls observed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSender for ScriptedSender {
    async fn send(&self, _record: &DeliveryRecord) -> SendOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            SendOutcome::Failed { reason: "provider unavailable".to_string() }
        } else {
            SendOutcome::Delivered { external_id: Some(format!("ext-{call}")) }
        }
    }
}

/// Build a record that has just gone through its first attempt with the
/// given outcome.
pub fn attempted_record(channel: Channel, status: DeliveryStatus) -> DeliveryRecord {
    let mut record = DeliveryRecord::new(Uuid::new_v4(), "user-1", channel);
    record.record_attempt(status, Utc::now());
    if status == DeliveryStatus::Failed {
        record.failure_reason = Some("provider unavailable".to_string());
    }
    record
}
