//! # Courier Core
//!
//! Delivery reliability services: the per-channel rule registry, circuit
//! breaker manager, retry scheduler, and the delivery tracking service that
//! ties them together over a storage port.
//!
//! The core never talks to a provider or a database directly. Transport is
//! behind [`delivery::ports::ChannelSender`]; persistence is behind
//! [`delivery::ports::DeliveryStore`], so a durable backing store can be
//! substituted without touching the state-machine logic.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod delivery;

// Re-export the service surface for convenience
pub use delivery::breaker::CircuitBreakerManager;
pub use delivery::ports::{ChannelSender, DeliveryStore, SendOutcome};
pub use delivery::rules::RuleRegistry;
pub use delivery::scheduler::RetryScheduler;
pub use delivery::service::{DeliveryService, DeliveryServiceBuilder, DeliveryStatusView};
