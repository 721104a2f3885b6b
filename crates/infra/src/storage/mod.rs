//! Storage adapters for the delivery core

pub mod memory;
