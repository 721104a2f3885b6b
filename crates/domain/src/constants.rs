//! Shared constants for the delivery core

use std::time::Duration;

/// Trailing window over which per-channel failure rates are evaluated when
/// deciding whether to trip a circuit breaker.
pub const FAILURE_WINDOW: Duration = Duration::from_secs(60 * 60);

/// How long computed channel/overall statistics stay valid in the cache.
pub const STATS_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Interval at which the housekeeping task purges expired stats-cache
/// entries.
pub const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
