//! In-memory delivery store
//!
//! Sharded-map implementation of the `DeliveryStore` port. Records and
//! attempt logs live in separate maps keyed by delivery id, so the
//! high-write-frequency attempt append path only touches one shard entry and
//! never contends with whole-table scans from the stats aggregator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::DeliveryStore;
use courier_domain::{
    Channel, DeliveryAttempt, DeliveryRecord, DeliveryStatus, OutcomeCounts, Result,
};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Map-backed delivery store with no durability
///
/// Suitable for tests and single-process embedding. Retention cleanup
/// removes whole deliveries (record plus attempts), never partially.
#[derive(Debug, Default)]
pub struct InMemoryDeliveryStore {
    records: DashMap<Uuid, DeliveryRecord>,
    attempts: DashMap<Uuid, Vec<DeliveryAttempt>>,
}

impl InMemoryDeliveryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl DeliveryStore for InMemoryDeliveryStore {
    async fn put_record(&self, record: DeliveryRecord) -> Result<()> {
        self.records.insert(record.id, record);
        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<DeliveryRecord>> {
        Ok(self.records.get(&id).map(|entry| entry.clone()))
    }

    async fn delete_record(&self, id: Uuid) -> Result<bool> {
        let existed = self.records.remove(&id).is_some();
        self.attempts.remove(&id);
        Ok(existed)
    }

    async fn append_attempt(&self, attempt: DeliveryAttempt) -> Result<()> {
        self.attempts.entry(attempt.delivery_id).or_default().push(attempt);
        Ok(())
    }

    async fn attempts_for(&self, id: Uuid) -> Result<Vec<DeliveryAttempt>> {
        let mut attempts =
            self.attempts.get(&id).map(|entry| entry.clone()).unwrap_or_default();
        attempts.sort_by_key(|attempt| attempt.timestamp);
        Ok(attempts)
    }

    async fn records_in_window(
        &self,
        channel: Option<Channel>,
        since: DateTime<Utc>,
    ) -> Result<Vec<DeliveryRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.created_at >= since)
            .filter(|entry| channel.map_or(true, |c| entry.channel == c))
            .map(|entry| entry.clone())
            .collect())
    }

    async fn outcome_counts_since(
        &self,
        channel: Channel,
        since: DateTime<Utc>,
    ) -> Result<OutcomeCounts> {
        let mut counts = OutcomeCounts::default();

        for entry in self.records.iter().filter(|entry| entry.channel == channel) {
            let Some(attempts) = self.attempts.get(entry.key()) else {
                continue;
            };

            for attempt in attempts.iter().filter(|a| a.timestamp >= since) {
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
        }

        Ok(counts)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let expired: Vec<Uuid> = self
            .records
            .iter()
            .filter(|entry| entry.created_at < cutoff)
            .map(|entry| *entry.key())
            .collect();

        for id in &expired {
            self.records.remove(id);
            self.attempts.remove(id);
        }

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Removed expired deliveries");
        }
        Ok(expired.len())
    }
}
