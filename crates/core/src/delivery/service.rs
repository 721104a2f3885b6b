//! Delivery tracking service
//!
//! `DeliveryService` is the one object callers construct: it owns the rule
//! registry, the circuit breaker manager, the retry scheduler, the stats
//! cache, and the housekeeping task, all over a pluggable storage port.
//! `shutdown` stops the housekeeping task and cancels every outstanding
//! retry timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::TimeDelta;
use courier_common::{Clock, SystemClock, TtlCache};
use courier_domain::constants::{CACHE_SWEEP_INTERVAL, FAILURE_WINDOW, STATS_CACHE_TTL};
use courier_domain::{
    Channel, ChannelStats, CircuitBreakerState, DeliveryAttempt, DeliveryError, DeliveryRecord,
    DeliveryRule, DeliveryRuleUpdate, DeliveryStatus, OverallStats, Result, RetryQueueEntry,
    StatsPeriod,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::breaker::CircuitBreakerManager;
use super::ports::{ChannelSender, DeliveryStore, SendOutcome};
use super::rules::RuleRegistry;
use super::scheduler::{RetryScheduler, ScheduledRetry};
use super::stats;

/// Current record plus its full attempt history, timestamp ascending
#[derive(Debug, Clone)]
pub struct DeliveryStatusView {
    pub record: DeliveryRecord,
    pub attempts: Vec<DeliveryAttempt>,
}

/// Builder for [`DeliveryService`]
pub struct DeliveryServiceBuilder {
    store: Option<Arc<dyn DeliveryStore>>,
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
    clock: Arc<dyn Clock>,
    stats_ttl: Duration,
    sweep_interval: Duration,
}

impl DeliveryServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            senders: HashMap::new(),
            clock: Arc::new(SystemClock),
            stats_ttl: STATS_CACHE_TTL,
            sweep_interval: CACHE_SWEEP_INTERVAL,
        }
    }

    /// Set the storage port (required)
    pub fn store(mut self, store: Arc<dyn DeliveryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register the sender for a channel
    pub fn sender(mut self, channel: Channel, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(channel, sender);
        self
    }

    /// Use a custom clock (useful for testing)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the stats cache TTL
    pub fn stats_ttl(mut self, ttl: Duration) -> Self {
        self.stats_ttl = ttl;
        self
    }

    /// Override the housekeeping sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Build the service and start its housekeeping task
    pub fn build(self) -> Result<DeliveryService> {
        let store = self
            .store
            .ok_or_else(|| DeliveryError::Validation("a delivery store is required".to_string()))?;

        let inner = Arc::new(ServiceInner {
            store,
            senders: self.senders,
            rules: RuleRegistry::new(),
            breakers: CircuitBreakerManager::new(Arc::clone(&self.clock)),
            scheduler: RetryScheduler::new(),
            channel_stats: TtlCache::with_clock(self.stats_ttl, Arc::clone(&self.clock)),
            overall_stats: TtlCache::with_clock(self.stats_ttl, Arc::clone(&self.clock)),
            clock: self.clock,
            shutdown: AtomicBool::new(false),
            sweeper: Mutex::new(None),
        });

        ServiceInner::start_sweeper(&inner, self.sweep_interval);

        Ok(DeliveryService { inner })
    }
}

impl Default for DeliveryServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Notification delivery reliability service
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct DeliveryService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<dyn DeliveryStore>,
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
    rules: RuleRegistry,
    breakers: CircuitBreakerManager,
    scheduler: RetryScheduler,
    channel_stats: TtlCache<(Channel, StatsPeriod), ChannelStats, Arc<dyn Clock>>,
    overall_stats: TtlCache<StatsPeriod, OverallStats, Arc<dyn Clock>>,
    clock: Arc<dyn Clock>,
    shutdown: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryService {
    /// Start building a service
    pub fn builder() -> DeliveryServiceBuilder {
        DeliveryServiceBuilder::new()
    }

    /// Report a delivery outcome
    ///
    /// Appends an attempt entry from the record's current attempt state,
    /// re-evaluates the channel's breaker, and — if the outcome was a
    /// failure and policy allows — arms a retry timer. Exhausted retries and
    /// circuit-open rejections are silent: the record simply stops receiving
    /// scheduled retries and callers poll status to detect it.
    #[instrument(skip(self, record), fields(delivery_id = %record.id, channel = %record.channel, status = %record.status))]
    pub async fn track_delivery(&self, record: DeliveryRecord) -> Result<()> {
        self.inner.track(record).await
    }

    /// Whether deliveries may currently be attempted on the channel
    pub fn should_attempt_delivery(&self, channel: Channel) -> bool {
        self.inner.breakers.should_attempt(channel)
    }

    /// Current record plus attempt history — pure read, no side effects
    pub async fn get_delivery_status(&self, delivery_id: Uuid) -> Result<DeliveryStatusView> {
        let record = self
            .inner
            .store
            .get_record(delivery_id)
            .await?
            .ok_or_else(|| DeliveryError::NotFound(format!("delivery {delivery_id}")))?;
        let attempts = self.inner.store.attempts_for(delivery_id).await?;

        Ok(DeliveryStatusView { record, attempts })
    }

    /// Per-channel statistics for a wall-clock period, cached briefly
    pub async fn get_channel_stats(
        &self,
        channel: Channel,
        period: StatsPeriod,
    ) -> Result<ChannelStats> {
        if let Some(cached) = self.inner.channel_stats.get(&(channel, period)) {
            return Ok(cached);
        }

        let computed = self.inner.compute_channel_stats(channel, period).await?;
        self.inner.channel_stats.insert((channel, period), computed.clone());
        Ok(computed)
    }

    /// Statistics aggregated across every channel, cached briefly
    pub async fn get_overall_stats(&self, period: StatsPeriod) -> Result<OverallStats> {
        if let Some(cached) = self.inner.overall_stats.get(&period) {
            return Ok(cached);
        }

        let mut per_channel = Vec::with_capacity(Channel::ALL.len());
        for channel in Channel::ALL {
            per_channel.push(self.get_channel_stats(channel, period).await?);
        }

        let overall =
            stats::aggregate_overall(period, per_channel, self.inner.clock.now_utc());
        self.inner.overall_stats.insert(period, overall.clone());
        Ok(overall)
    }

    /// Snapshot of every channel's breaker state
    pub fn get_circuit_breaker_states(&self) -> Vec<CircuitBreakerState> {
        self.inner.breakers.snapshots()
    }

    /// Force a channel's breaker to closed
    ///
    /// Also drops cached stats touching the channel, since the tripped flag
    /// they carry just changed.
    pub fn reset_circuit_breaker(&self, channel: Channel) -> bool {
        self.inner.breakers.reset(channel);
        for period in [StatsPeriod::Hour, StatsPeriod::Day, StatsPeriod::Week, StatsPeriod::Month]
        {
            self.inner.channel_stats.remove(&(channel, period));
            self.inner.overall_stats.remove(&period);
        }
        true
    }

    /// Merge a partial update into a channel's delivery rule
    pub fn update_delivery_rule(
        &self,
        channel: Channel,
        update: DeliveryRuleUpdate,
    ) -> Result<DeliveryRule> {
        self.inner.rules.update(channel, update)
    }

    /// All active delivery rules
    pub fn get_delivery_rules(&self) -> Vec<DeliveryRule> {
        self.inner.rules.all()
    }

    /// Cancel any pending retry for a delivery; returns whether one existed
    pub fn cancel_retries(&self, delivery_id: Uuid) -> bool {
        self.inner.scheduler.cancel(delivery_id)
    }

    /// Snapshot of outstanding scheduled retries, soonest first
    pub fn get_retry_queue_status(&self) -> Vec<RetryQueueEntry> {
        self.inner.scheduler.queue_status()
    }

    /// Remove whole deliveries older than the given age
    ///
    /// Returns the number of deliveries removed (records and their
    /// attempts).
    #[instrument(skip(self))]
    pub async fn cleanup_old_deliveries(&self, older_than_days: u32) -> Result<usize> {
        let cutoff =
            self.inner.clock.now_utc() - TimeDelta::days(i64::from(older_than_days));
        let removed = self.inner.store.delete_older_than(cutoff).await?;

        if removed > 0 {
            info!(removed, older_than_days, "Removed old deliveries");
        }
        Ok(removed)
    }

    /// Stop the housekeeping task and cancel every outstanding retry timer
    pub fn shutdown(&self) {
        info!("Shutting down delivery service");
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.scheduler.shutdown();

        let handle = {
            let mut sweeper = self
                .inner
                .sweeper
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            sweeper.take()
        };
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl ServiceInner {
    async fn track(self: &Arc<Self>, record: DeliveryRecord) -> Result<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(DeliveryError::Shutdown);
        }

        let now = self.clock.now_utc();
        let channel = record.channel;
        let status = record.status;

        let attempt =
            DeliveryAttempt::from_record(&record, record.last_attempt_at.unwrap_or(now));
        self.store.put_record(record.clone()).await?;
        self.store.append_attempt(attempt).await?;

        let window_start = now - TimeDelta::from_std(FAILURE_WINDOW).unwrap_or(TimeDelta::MAX);
        let counts = self.store.outcome_counts_since(channel, window_start).await?;
        let rule = self.rules.get(channel);
        self.breakers.record_outcome(channel, status, &counts, &rule);

        if status == DeliveryStatus::Failed {
            self.schedule_retry(&record, &rule);
        }

        Ok(())
    }

    /// Arm a retry timer for a failed delivery, if policy allows
    ///
    /// Silent no-op when retries are exhausted or the channel's breaker is
    /// open; both conditions are observable through status polling and
    /// breaker queries rather than errors.
    fn schedule_retry(self: &Arc<Self>, record: &DeliveryRecord, rule: &DeliveryRule) {
        if record.attempts >= rule.max_retries {
            debug!(
                delivery_id = %record.id,
                attempts = record.attempts,
                max_retries = rule.max_retries,
                "Retries exhausted; delivery is permanently failed"
            );
            return;
        }

        if !self.breakers.should_attempt(record.channel) {
            debug!(
                delivery_id = %record.id,
                channel = %record.channel,
                "Circuit open; retry not scheduled"
            );
            return;
        }

        let delay = rule.retry_delay(record.attempts.max(1));
        let next_retry_at =
            self.clock.now_utc() + TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
        let generation = self.scheduler.next_generation();

        let weak = Arc::downgrade(self);
        let delivery_id = record.id;
        let handle =
            tokio::spawn(async move { Self::run_retry(weak, delivery_id, generation, delay).await });

        self.scheduler.register(
            delivery_id,
            ScheduledRetry {
                channel: record.channel,
                attempts: record.attempts,
                next_retry_at,
                generation,
                handle,
            },
        );

        debug!(
            delivery_id = %record.id,
            attempt = record.attempts + 1,
            delay_ms = delay.as_millis() as u64,
            "Retry scheduled"
        );
    }

    /// Body of an armed retry timer
    ///
    /// Claims its scheduler entry under its generation (losing silently to
    /// cancellation or replacement), re-validates the breaker, performs the
    /// attempt, and feeds the outcome back through `track`, which may arm
    /// the next retry.
    async fn run_retry(weak: Weak<Self>, delivery_id: Uuid, generation: u64, delay: Duration) {
        tokio::time::sleep(delay).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        if inner.shutdown.load(Ordering::Acquire) {
            return;
        }
        if !inner.scheduler.claim(delivery_id, generation) {
            debug!(delivery_id = %delivery_id, "Retry superseded before firing");
            return;
        }

        let mut record = match inner.store.get_record(delivery_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(delivery_id = %delivery_id, "Delivery vanished before retry fired");
                return;
            }
            Err(err) => {
                warn!(delivery_id = %delivery_id, error = %err, "Failed to load delivery for retry");
                return;
            }
        };

        // Re-check at fire time: if the breaker opened while we slept, the
        // delivery stalls until another outcome or external retry touches it.
        if !inner.breakers.should_attempt(record.channel) {
            debug!(
                delivery_id = %delivery_id,
                channel = %record.channel,
                "Circuit open at fire time; retry aborted"
            );
            return;
        }

        let now = inner.clock.now_utc();
        record.attempts += 1;
        record.status = DeliveryStatus::Pending;
        record.last_attempt_at = Some(now);
        if let Err(err) = inner.store.put_record(record.clone()).await {
            warn!(delivery_id = %delivery_id, error = %err, "Failed to persist retry attempt");
            return;
        }

        let Some(sender) = inner.senders.get(&record.channel).cloned() else {
            warn!(channel = %record.channel, "No sender registered; retry dropped");
            return;
        };

        let outcome = sender.send(&record).await;
        let now = inner.clock.now_utc();
        match outcome {
            SendOutcome::Delivered { external_id } => record.mark_delivered(now, external_id),
            SendOutcome::Failed { reason } => record.mark_failed(now, reason),
        }

        if let Err(err) = inner.track(record).await {
            warn!(delivery_id = %delivery_id, error = %err, "Failed to record retry outcome");
        }
    }

    async fn compute_channel_stats(
        &self,
        channel: Channel,
        period: StatsPeriod,
    ) -> Result<ChannelStats> {
        let now = self.clock.now_utc();
        let window_start = period.window_start(now);
        let records = self.store.records_in_window(Some(channel), window_start).await?;
        let tripped = self.breakers.snapshot(channel).state
            == courier_domain::CircuitState::Open;

        Ok(stats::compute_channel_stats(channel, period, &records, tripped, now))
    }

    fn start_sweeper(inner: &Arc<Self>, interval: Duration) {
        match Handle::try_current() {
            Ok(runtime) => {
                let weak = Arc::downgrade(inner);
                let handle = runtime.spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.tick().await;

                    loop {
                        ticker.tick().await;

                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        if inner.shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        let purged = inner.channel_stats.purge_expired()
                            + inner.overall_stats.purge_expired();
                        if purged > 0 {
                            debug!(purged, "Purged expired stats cache entries");
                        }
                    }
                });

                let mut sweeper =
                    inner.sweeper.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                *sweeper = Some(handle);
            }
            Err(_) => {
                warn!("Skipping stats cache sweeper: no active Tokio runtime detected");
            }
        }
    }
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.scheduler.shutdown();

        let handle = {
            let mut sweeper = self.sweeper.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            sweeper.take()
        };
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
