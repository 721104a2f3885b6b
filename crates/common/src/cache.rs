//! Thread-safe TTL cache
//!
//! A small map-backed cache where every entry expires a fixed time after
//! insertion. Expired entries are dropped lazily on read and eagerly by
//! [`TtlCache::purge_expired`], which callers run from a periodic
//! housekeeping task.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// Entry stored in the cache alongside its insertion timestamp
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

/// Generic thread-safe cache with a single cache-wide TTL
///
/// # Type Parameters
/// - `K`: Key type (must be `Eq + Hash + Clone`)
/// - `V`: Value type (must be `Clone`)
/// - `C`: Clock type for expiry checks (defaults to `SystemClock`)
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use courier_common::cache::TtlCache;
///
/// let cache: TtlCache<String, i32> = TtlCache::new(Duration::from_secs(60));
/// cache.insert("key".to_string(), 42);
/// assert_eq!(cache.get(&"key".to_string()), Some(42));
/// ```
pub struct TtlCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    ttl: Duration,
    clock: C,
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache with the given TTL using the system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), ttl, clock }
    }

    /// Insert a value, replacing any previous entry for the key
    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now_utc();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, CacheEntry { value, inserted_at: now });
    }

    /// Get a value from the cache
    ///
    /// Returns `None` if the key doesn't exist or the entry has expired.
    /// Expired entries are removed on read.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_utc();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        match entries.get(key) {
            Some(entry) if !self.is_expired(entry, now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        entries.remove(key);
        None
    }

    /// Remove a value from the cache
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).map(|e| e.value)
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Remove expired entries
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_utc();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));

        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "Evicted expired cache entries");
        }
        purged
    }

    /// Get the current number of entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
        now - entry.inserted_at >= ttl
    }
}

impl<K, V, C> Clone for TtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self { entries: Arc::clone(&self.entries), ttl: self.ttl, clock: self.clock.clone() }
    }
}
