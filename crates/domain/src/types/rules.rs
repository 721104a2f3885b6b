//! Per-channel delivery rules: retry limits, backoff, breaker policy

use std::fmt;
use std::time::Duration;

use courier_common::{duration_millis, duration_millis_vec};
use serde::{Deserialize, Serialize};

use crate::errors::{DeliveryError, Result};
use crate::types::delivery::Channel;

/// Backoff strategy mapping attempt number to retry delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Delay is the interval for the attempt, unscaled
    Fixed,
    /// Delay is the interval scaled by 2^(attempts - 1)
    Exponential,
    /// Delay is the interval scaled by the attempt count
    Linear,
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackoffKind::Fixed => "fixed",
            BackoffKind::Exponential => "exponential",
            BackoffKind::Linear => "linear",
        };
        f.write_str(name)
    }
}

/// Per-channel retry and circuit-breaker policy
///
/// Exactly one rule is active per channel at a time; updates are validated
/// before the registry swaps the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRule {
    pub channel: Channel,
    /// Maximum number of scheduled retries per delivery
    pub max_retries: u32,
    /// Ordered retry intervals; index = attempt number, last value repeats
    #[serde(with = "duration_millis_vec")]
    pub retry_intervals: Vec<Duration>,
    pub backoff: BackoffKind,
    /// Failure percentage (0-100) over the trailing window that trips the
    /// breaker
    pub failure_threshold: f64,
    /// How long an open breaker waits before allowing a probe
    #[serde(with = "duration_millis")]
    pub circuit_breaker_duration: Duration,
}

/// Partial update merged into an existing rule
///
/// Absent fields keep their current value. The merged result is validated
/// before it replaces the active rule.
#[derive(Debug, Clone, Default)]
pub struct DeliveryRuleUpdate {
    pub max_retries: Option<u32>,
    pub retry_intervals: Option<Vec<Duration>>,
    pub backoff: Option<BackoffKind>,
    pub failure_threshold: Option<f64>,
    pub circuit_breaker_duration: Option<Duration>,
}

impl DeliveryRule {
    /// Channel-appropriate default rule
    ///
    /// SMS gets fewer retries, shorter intervals, and a higher failure
    /// tolerance than email, reflecting per-message cost and volume
    /// differences; in-app delivery barely retries at all.
    pub fn default_for(channel: Channel) -> Self {
        const MINUTE: Duration = Duration::from_secs(60);

        match channel {
            Channel::Email => Self {
                channel,
                max_retries: 3,
                retry_intervals: vec![5 * MINUTE, 15 * MINUTE, 60 * MINUTE],
                backoff: BackoffKind::Exponential,
                failure_threshold: 20.0,
                circuit_breaker_duration: 10 * MINUTE,
            },
            Channel::Sms => Self {
                channel,
                max_retries: 2,
                retry_intervals: vec![MINUTE, 5 * MINUTE],
                backoff: BackoffKind::Fixed,
                failure_threshold: 30.0,
                circuit_breaker_duration: 5 * MINUTE,
            },
            Channel::Push => Self {
                channel,
                max_retries: 3,
                retry_intervals: vec![MINUTE, 5 * MINUTE, 15 * MINUTE],
                backoff: BackoffKind::Exponential,
                failure_threshold: 25.0,
                circuit_breaker_duration: 5 * MINUTE,
            },
            Channel::InApp => Self {
                channel,
                max_retries: 1,
                retry_intervals: vec![MINUTE],
                backoff: BackoffKind::Fixed,
                failure_threshold: 50.0,
                circuit_breaker_duration: MINUTE,
            },
        }
    }

    /// Validate the rule
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(DeliveryError::Validation(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.retry_intervals.is_empty() {
            return Err(DeliveryError::Validation(
                "retry_intervals must not be empty".to_string(),
            ));
        }

        if self.retry_intervals.iter().any(|i| i.is_zero()) {
            return Err(DeliveryError::Validation(
                "retry_intervals must all be positive".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.failure_threshold) {
            return Err(DeliveryError::Validation(
                "failure_threshold must be between 0 and 100".to_string(),
            ));
        }

        if self.circuit_breaker_duration.is_zero() {
            return Err(DeliveryError::Validation(
                "circuit_breaker_duration must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Compute the retry delay after the given number of attempts
    ///
    /// The interval index is `attempts - 1`, clamped to the last interval
    /// once attempts exceed the table. The backoff kind then scales the base
    /// interval: fixed leaves it alone, exponential multiplies by
    /// `2^(attempts - 1)`, linear multiplies by the attempt count.
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        let attempts = attempts.max(1);
        let index = ((attempts - 1) as usize).min(self.retry_intervals.len() - 1);
        let base = self.retry_intervals[index];

        match self.backoff {
            BackoffKind::Fixed => base,
            BackoffKind::Exponential => {
                let factor = 2u32.saturating_pow(attempts - 1);
                base.saturating_mul(factor)
            }
            BackoffKind::Linear => base.saturating_mul(attempts),
        }
    }

    /// Merge a partial update into this rule and validate the result
    ///
    /// Returns the merged rule without mutating `self`; a validation error
    /// leaves the active rule untouched.
    pub fn apply(&self, update: DeliveryRuleUpdate) -> Result<DeliveryRule> {
        let merged = DeliveryRule {
            channel: self.channel,
            max_retries: update.max_retries.unwrap_or(self.max_retries),
            retry_intervals: update
                .retry_intervals
                .unwrap_or_else(|| self.retry_intervals.clone()),
            backoff: update.backoff.unwrap_or(self.backoff),
            failure_threshold: update.failure_threshold.unwrap_or(self.failure_threshold),
            circuit_breaker_duration: update
                .circuit_breaker_duration
                .unwrap_or(self.circuit_breaker_duration),
        };

        merged.validate()?;
        Ok(merged)
    }
}
