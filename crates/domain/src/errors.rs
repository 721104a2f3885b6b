//! Error types used throughout the delivery core

use thiserror::Error;

use crate::types::delivery::Channel;

/// Main error type for Courier operations
///
/// Transient send failures, exhausted retries, and circuit-open rejections
/// are deliberately *not* error values: they are silent states observable
/// through record status, `should_attempt_delivery`, and breaker snapshots.
/// Only malformed administrative input and genuinely broken invocations
/// surface here.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Malformed rule update, rejected before any state is mutated
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Unknown delivery id on a status query
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage-port failure (never emitted by the in-memory adapter)
    #[error("Storage error: {0}")]
    Storage(String),

    /// No sender registered for the channel
    #[error("No sender registered for channel {0}")]
    ChannelUnavailable(Channel),

    /// Operation submitted after shutdown
    #[error("Delivery service is shutting down")]
    Shutdown,
}

/// Result type alias for Courier operations
pub type Result<T> = std::result::Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `DeliveryError` display formatting.
    ///
    /// Assertions:
    /// - Ensures each variant renders its payload.
    #[test]
    fn test_error_display() {
        let err = DeliveryError::Validation("failure_threshold out of range".to_string());
        assert!(err.to_string().contains("failure_threshold out of range"));

        let err = DeliveryError::NotFound("delivery abc".to_string());
        assert!(err.to_string().contains("delivery abc"));

        let err = DeliveryError::ChannelUnavailable(Channel::Sms);
        assert!(err.to_string().contains("sms"));
    }
}
