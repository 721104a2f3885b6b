//! Port interfaces for delivery tracking
//!
//! These traits define the boundaries between the reliability core and
//! infrastructure implementations: one for provider transport, one for
//! persistence of records and the attempt log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_domain::{
    Channel, DeliveryAttempt, DeliveryRecord, OutcomeCounts, Result,
};
use uuid::Uuid;

/// Outcome of a single provider send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The provider accepted the message
    Delivered {
        /// Correlation id from the provider, if any
        external_id: Option<String>,
    },
    /// The provider rejected or dropped the message
    Failed {
        /// Provider-reported reason
        reason: String,
    },
}

/// Trait for attempting delivery of a payload on one channel
///
/// One sender exists per channel. The core never constructs
/// provider-specific requests; it hands the record over and interprets the
/// result as delivered or failed.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Attempt delivery of the record's payload to its destination
    async fn send(&self, record: &DeliveryRecord) -> SendOutcome;
}

/// Trait for persisting delivery records and the attempt log
///
/// The in-memory adapter in `courier-infra` is the default; a durable store
/// implements the same surface. Retention cleanup removes whole deliveries
/// (record plus attempts), never partially.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Insert or replace a delivery record
    async fn put_record(&self, record: DeliveryRecord) -> Result<()>;

    /// Fetch a delivery record by id
    async fn get_record(&self, id: Uuid) -> Result<Option<DeliveryRecord>>;

    /// Remove a delivery record and its attempts; returns whether it existed
    async fn delete_record(&self, id: Uuid) -> Result<bool>;

    /// Append an attempt-log entry
    async fn append_attempt(&self, attempt: DeliveryAttempt) -> Result<()>;

    /// All attempts for a delivery, ordered by timestamp ascending
    async fn attempts_for(&self, id: Uuid) -> Result<Vec<DeliveryAttempt>>;

    /// Records created at or after `since`, optionally restricted to a
    /// channel
    async fn records_in_window(
        &self,
        channel: Option<Channel>,
        since: DateTime<Utc>,
    ) -> Result<Vec<DeliveryRecord>>;

    /// Outcome totals from attempt entries at or after `since` for a channel
    async fn outcome_counts_since(
        &self,
        channel: Channel,
        since: DateTime<Utc>,
    ) -> Result<OutcomeCounts>;

    /// Remove whole deliveries created before `cutoff`; returns the count
    /// removed
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
