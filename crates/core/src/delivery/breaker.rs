//! Per-channel circuit breaker manager
//!
//! State machine per channel:
//! - closed → open: a failing outcome whose trailing-window failure rate
//!   (failed + bounced ÷ sent) meets or exceeds the rule's threshold trips
//!   the breaker and schedules the next probe window.
//! - open → half-open: lazily, the next time the channel is queried or an
//!   outcome is recorded after `next_retry_time` has passed. No active
//!   probing is pushed; it is pulled on next access.
//! - half-open → closed: the next delivered outcome while half-open resets
//!   the failure count and clears the open timestamps.
//! - half-open stays effectively open on failure: the failure count keeps
//!   growing and the same rate rule as closed → open decides whether to trip
//!   again.
//!
//! Half-open does not limit how many concurrent probe deliveries pass
//! through before the breaker re-opens or closes, so the system can
//! over-probe transiently under load.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::TimeDelta;
use courier_common::Clock;
use courier_domain::{
    Channel, CircuitBreakerState, CircuitState, DeliveryRule, DeliveryStatus, OutcomeCounts,
};
use tracing::{debug, info, warn};

/// Manager owning one breaker state per channel
///
/// The channel map is immutable after construction; each state sits behind
/// its own mutex so outcome recordings for the same channel are serialized
/// (no lost failure-count updates) while different channels never contend.
pub struct CircuitBreakerManager {
    states: HashMap<Channel, Mutex<CircuitBreakerState>>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerManager {
    /// Create a manager with a fresh closed breaker for every channel
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let states = Channel::ALL
            .iter()
            .map(|&channel| (channel, Mutex::new(CircuitBreakerState::new(channel))))
            .collect();

        Self { states, clock }
    }

    /// Record a delivery outcome for a channel
    ///
    /// `counts` are the trailing-window outcome totals for the channel, used
    /// for the rate check; `rule` supplies the threshold and the open
    /// duration.
    pub fn record_outcome(
        &self,
        channel: Channel,
        status: DeliveryStatus,
        counts: &OutcomeCounts,
        rule: &DeliveryRule,
    ) {
        let Some(entry) = self.states.get(&channel) else {
            return;
        };
        let mut state = entry.lock().unwrap_or_else(|poisoned| {
            warn!(channel = %channel, "Breaker state lock poisoned during record_outcome");
            poisoned.into_inner()
        });

        let now = self.clock.now_utc();
        Self::maybe_half_open(&mut state, now);

        match status {
            DeliveryStatus::Delivered => {
                if state.state == CircuitState::HalfOpen {
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.opened_at = None;
                    state.next_retry_time = None;
                    info!(channel = %channel, "Circuit breaker closed after successful probe");
                }
            }
            DeliveryStatus::Failed | DeliveryStatus::Bounced => {
                state.failure_count += 1;
                state.last_failure_time = Some(now);

                let rate = counts.failure_rate();
                if state.state != CircuitState::Open && rate >= rule.failure_threshold {
                    let reopen = TimeDelta::from_std(rule.circuit_breaker_duration)
                        .unwrap_or(TimeDelta::MAX);
                    state.trip(now, reopen);
                    warn!(
                        channel = %channel,
                        failure_rate = rate,
                        threshold = rule.failure_threshold,
                        "Circuit breaker opened"
                    );
                }
            }
            DeliveryStatus::Pending | DeliveryStatus::Sent => {}
        }
    }

    /// Whether deliveries may currently be attempted on the channel
    ///
    /// False only while the breaker is open; closed and half-open both allow
    /// attempts. Queries are transition points: an open breaker whose probe
    /// window has arrived moves to half-open here.
    pub fn should_attempt(&self, channel: Channel) -> bool {
        let Some(entry) = self.states.get(&channel) else {
            return true;
        };
        let mut state = entry.lock().unwrap_or_else(|poisoned| {
            warn!(channel = %channel, "Breaker state lock poisoned during should_attempt");
            poisoned.into_inner()
        });

        Self::maybe_half_open(&mut state, self.clock.now_utc());
        state.state != CircuitState::Open
    }

    /// Force a channel's breaker to closed, clearing counters and timestamps
    pub fn reset(&self, channel: Channel) {
        let Some(entry) = self.states.get(&channel) else {
            return;
        };
        let mut state = entry.lock().unwrap_or_else(|poisoned| {
            warn!(channel = %channel, "Breaker state lock poisoned during reset");
            poisoned.into_inner()
        });

        state.reset();
        info!(channel = %channel, "Circuit breaker manually reset");
    }

    /// Snapshot of one channel's breaker state
    pub fn snapshot(&self, channel: Channel) -> CircuitBreakerState {
        self.states
            .get(&channel)
            .map(|entry| {
                entry
                    .lock()
                    .unwrap_or_else(|poisoned| {
                        warn!(channel = %channel, "Breaker state lock poisoned during snapshot");
                        poisoned.into_inner()
                    })
                    .clone()
            })
            .unwrap_or_else(|| CircuitBreakerState::new(channel))
    }

    /// Snapshots for every channel, in `Channel::ALL` order
    pub fn snapshots(&self) -> Vec<CircuitBreakerState> {
        Channel::ALL.iter().map(|&channel| self.snapshot(channel)).collect()
    }

    fn maybe_half_open(state: &mut CircuitBreakerState, now: chrono::DateTime<chrono::Utc>) {
        if state.state == CircuitState::Open {
            if let Some(next_retry) = state.next_retry_time {
                if now >= next_retry {
                    state.state = CircuitState::HalfOpen;
                    debug!(channel = %state.channel, "Circuit breaker transitioned to half-open");
                }
            }
        }
    }
}
