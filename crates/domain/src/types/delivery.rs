//! Delivery records and the append-only attempt log

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification transport channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    InApp,
}

impl Channel {
    /// Every known channel, in registry/reporting order
    pub const ALL: [Channel; 4] = [Channel::Email, Channel::Sms, Channel::Push, Channel::InApp];

    /// Stable lowercase name for logging and map keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
            Channel::InApp => "in_app",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a record (and of each logged attempt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Queued or mid-attempt; no outcome recorded yet
    Pending,
    /// Handed to the provider, final confirmation outstanding
    Sent,
    /// Confirmed delivered
    Delivered,
    /// Provider reported a failure
    Failed,
    /// Provider reported a hard bounce
    Bounced,
}

impl DeliveryStatus {
    /// Whether this status ends the delivery successfully
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }

    /// Whether this status counts as a failure outcome
    pub fn is_failure(&self) -> bool {
        matches!(self, DeliveryStatus::Failed | DeliveryStatus::Bounced)
    }

    /// Whether an outcome has been recorded at all
    pub fn is_outcome(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Bounced => "bounced",
        };
        f.write_str(name)
    }
}

/// One logical notification delivery on one channel
///
/// Created when a send is first attempted, mutated on every attempt outcome,
/// and removed only by the age-based retention sweep. The attempt counter is
/// monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub user_id: String,
    pub channel: Channel,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Correlation id handed back by the channel sender
    pub external_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl DeliveryRecord {
    /// Create a new record for a first send attempt
    pub fn new(notification_id: Uuid, user_id: impl Into<String>, channel: Channel) -> Self {
        Self {
            id: Uuid::new_v4(),
            notification_id,
            user_id: user_id.into(),
            channel,
            status: DeliveryStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            last_attempt_at: None,
            delivered_at: None,
            failure_reason: None,
            external_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach free-form metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Record an attempt outcome, advancing the attempt counter
    pub fn record_attempt(&mut self, status: DeliveryStatus, now: DateTime<Utc>) {
        self.attempts += 1;
        self.status = status;
        self.last_attempt_at = Some(now);
        if status == DeliveryStatus::Delivered {
            self.delivered_at = Some(now);
        }
    }

    /// Mark the current attempt as delivered
    ///
    /// Does not advance the attempt counter: the counter moves once per
    /// attempt, when the attempt starts or is first reported.
    pub fn mark_delivered(&mut self, now: DateTime<Utc>, external_id: Option<String>) {
        self.status = DeliveryStatus::Delivered;
        self.delivered_at = Some(now);
        self.last_attempt_at = Some(now);
        self.failure_reason = None;
        if external_id.is_some() {
            self.external_id = external_id;
        }
    }

    /// Mark the current attempt as failed
    pub fn mark_failed(&mut self, now: DateTime<Utc>, reason: impl Into<String>) {
        self.status = DeliveryStatus::Failed;
        self.last_attempt_at = Some(now);
        self.failure_reason = Some(reason.into());
    }
}

/// Immutable attempt-log entry
///
/// Append-only; status queries return entries ordered by timestamp
/// ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub attempt_number: u32,
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    pub response_code: Option<i32>,
    pub response_message: Option<String>,
    pub error_detail: Option<String>,
}

impl DeliveryAttempt {
    /// Create a bare attempt entry
    pub fn new(
        delivery_id: Uuid,
        attempt_number: u32,
        status: DeliveryStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            delivery_id,
            attempt_number,
            status,
            timestamp,
            response_code: None,
            response_message: None,
            error_detail: None,
        }
    }

    /// Build an attempt entry from a record's current attempt state
    pub fn from_record(record: &DeliveryRecord, timestamp: DateTime<Utc>) -> Self {
        let mut attempt = Self::new(record.id, record.attempts, record.status, timestamp);
        attempt.error_detail = record.failure_reason.clone();
        attempt
    }

    /// Attach a provider response code and message
    pub fn with_response(mut self, code: i32, message: impl Into<String>) -> Self {
        self.response_code = Some(code);
        self.response_message = Some(message.into());
        self
    }
}
