//! Notification delivery reliability services
//!
//! Control flow: a caller reports a delivery outcome through
//! [`service::DeliveryService::track_delivery`] → the tracker appends an
//! attempt entry → the breaker manager re-evaluates channel health → if the
//! outcome was a failure and policy allows it, the scheduler arms a
//! cancellable timer → on firing, the timer re-checks the breaker, invokes
//! the channel sender, and feeds the result back into the tracker, closing
//! the loop.

pub mod breaker;
pub mod ports;
pub mod rules;
pub mod scheduler;
pub mod service;
pub mod stats;
