//! Cancellable retry scheduling
//!
//! The scheduler owns every outstanding retry timer, keyed by delivery id.
//! At most one pending timer exists per delivery: arming a new one atomically
//! cancels and replaces the old one. Each armed timer carries a generation
//! number; a fired task must claim its entry under its own generation before
//! acting, so a task that is already executing when cancellation or
//! replacement happens silently loses the race instead of double-firing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use courier_domain::{Channel, RetryQueueEntry};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// One armed retry timer
#[derive(Debug)]
pub(crate) struct ScheduledRetry {
    pub channel: Channel,
    /// Attempt count at scheduling time
    pub attempts: u32,
    pub next_retry_at: DateTime<Utc>,
    pub generation: u64,
    pub handle: JoinHandle<()>,
}

/// Owner of all outstanding retry timers
pub struct RetryScheduler {
    entries: DashMap<Uuid, ScheduledRetry>,
    generation: AtomicU64,
    shutdown: AtomicBool,
}

impl RetryScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self { entries: DashMap::new(), generation: AtomicU64::new(0), shutdown: AtomicBool::new(false) }
    }

    /// Allocate a generation for a timer about to be armed
    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Arm a timer, cancelling and replacing any previous one for the id
    pub(crate) fn register(&self, delivery_id: Uuid, entry: ScheduledRetry) {
        if let Some(previous) = self.entries.insert(delivery_id, entry) {
            previous.handle.abort();
            debug!(delivery_id = %delivery_id, "Superseded pending retry");
        }
    }

    /// Claim the entry for a firing task
    ///
    /// Removes and returns true only when the live entry still carries the
    /// task's generation; a stale task (cancelled, replaced, or racing a
    /// shutdown) gets false and must abort silently.
    pub(crate) fn claim(&self, delivery_id: Uuid, generation: u64) -> bool {
        if self.shutdown.load(Ordering::Acquire) {
            return false;
        }
        self.entries.remove_if(&delivery_id, |_, entry| entry.generation == generation).is_some()
    }

    /// Cancel any pending timer for a delivery
    ///
    /// Safe to call when nothing is outstanding; returns whether a pending
    /// timer existed.
    pub fn cancel(&self, delivery_id: Uuid) -> bool {
        match self.entries.remove(&delivery_id) {
            Some((_, entry)) => {
                entry.handle.abort();
                debug!(delivery_id = %delivery_id, "Cancelled pending retry");
                true
            }
            None => false,
        }
    }

    /// Snapshot of every outstanding retry, soonest first
    pub fn queue_status(&self) -> Vec<RetryQueueEntry> {
        let mut entries: Vec<RetryQueueEntry> = self
            .entries
            .iter()
            .map(|item| RetryQueueEntry {
                delivery_id: *item.key(),
                channel: item.channel,
                attempts: item.attempts,
                next_retry_at: item.next_retry_at,
            })
            .collect();

        entries.sort_by_key(|entry| entry.next_retry_at);
        entries
    }

    /// Number of outstanding timers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timers are outstanding
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Abort every outstanding timer and refuse further claims
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);

        let ids: Vec<Uuid> = self.entries.iter().map(|item| *item.key()).collect();
        for id in ids {
            if let Some((_, entry)) = self.entries.remove(&id) {
                entry.handle.abort();
            }
        }
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::new()
    }
}
