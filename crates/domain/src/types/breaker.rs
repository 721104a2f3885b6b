//! Circuit breaker state data
//!
//! The state machine itself (transition rules, window arithmetic) lives in
//! `courier-core`; this module holds the per-channel state record and the
//! state enum.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::delivery::Channel;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, allowing deliveries
    Closed,
    /// Circuit is open, withholding deliveries
    Open,
    /// Circuit is half-open, allowing probe deliveries to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Per-channel circuit breaker state
///
/// Exactly one instance exists per channel, created at startup and never
/// destroyed. Transitions are driven only by outcome recording and elapsed
/// time, except for the explicit manual reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub channel: Channel,
    pub state: CircuitState,
    pub failure_count: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    /// Only meaningful while open: when the next probe may pass
    pub next_retry_time: Option<DateTime<Utc>>,
}

impl CircuitBreakerState {
    /// Fresh closed state for a channel
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            opened_at: None,
            next_retry_time: None,
        }
    }

    /// Force the breaker to closed, clearing counters and timestamps
    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure_time = None;
        self.opened_at = None;
        self.next_retry_time = None;
    }

    /// Move to open at `now`, scheduling the next probe window
    pub fn trip(&mut self, now: DateTime<Utc>, reopen_after: chrono::TimeDelta) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.next_retry_time = Some(now + reopen_after);
    }
}
