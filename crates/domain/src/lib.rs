//! # Courier Domain
//!
//! Domain types for the notification delivery reliability core: delivery
//! records and attempt-log entries, per-channel delivery rules, circuit
//! breaker state, derived statistics, and the shared error taxonomy.
//!
//! Everything here is plain data plus the invariant-preserving methods on
//! it. Services, ports, and adapters live in `courier-core` and
//! `courier-infra`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used types for convenience
pub use errors::{DeliveryError, Result};
pub use types::breaker::{CircuitBreakerState, CircuitState};
pub use types::delivery::{Channel, DeliveryAttempt, DeliveryRecord, DeliveryStatus};
pub use types::rules::{BackoffKind, DeliveryRule, DeliveryRuleUpdate};
pub use types::stats::{
    ChannelStats, OutcomeCounts, OverallStats, RetryQueueEntry, StatsPeriod,
};
