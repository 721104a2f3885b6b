//! Per-channel delivery rule registry
//!
//! Long-lived, read-mostly state: every channel has exactly one active rule,
//! seeded with channel-appropriate defaults at construction. Updates merge a
//! partial change into the existing rule and validate before swapping, so a
//! rejected update never leaves a half-applied rule behind.

use std::collections::HashMap;
use std::sync::RwLock;

use courier_domain::{Channel, DeliveryRule, DeliveryRuleUpdate, Result};
use tracing::{debug, warn};

/// Registry holding the active delivery rule for every channel
pub struct RuleRegistry {
    rules: RwLock<HashMap<Channel, DeliveryRule>>,
}

impl RuleRegistry {
    /// Create a registry seeded with defaults for every known channel
    pub fn new() -> Self {
        let rules = Channel::ALL
            .iter()
            .map(|&channel| (channel, DeliveryRule::default_for(channel)))
            .collect();

        Self { rules: RwLock::new(rules) }
    }

    /// Get the active rule for a channel
    ///
    /// Never fails: every channel is seeded at construction, and the seeded
    /// default backs any lookup that would otherwise miss.
    pub fn get(&self, channel: Channel) -> DeliveryRule {
        let rules = self.rules.read().unwrap_or_else(|poisoned| {
            warn!("Rule registry lock poisoned during get");
            poisoned.into_inner()
        });

        rules.get(&channel).cloned().unwrap_or_else(|| DeliveryRule::default_for(channel))
    }

    /// Merge a partial update into a channel's rule
    ///
    /// The merged rule is validated before it replaces the active one; a
    /// validation error leaves the current rule intact.
    pub fn update(&self, channel: Channel, update: DeliveryRuleUpdate) -> Result<DeliveryRule> {
        let mut rules = self.rules.write().unwrap_or_else(|poisoned| {
            warn!("Rule registry lock poisoned during update");
            poisoned.into_inner()
        });

        let current =
            rules.get(&channel).cloned().unwrap_or_else(|| DeliveryRule::default_for(channel));
        let merged = current.apply(update)?;

        debug!(channel = %channel, "Delivery rule updated");
        rules.insert(channel, merged.clone());
        Ok(merged)
    }

    /// All active rules, in `Channel::ALL` order
    pub fn all(&self) -> Vec<DeliveryRule> {
        Channel::ALL.iter().map(|&channel| self.get(channel)).collect()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use courier_domain::BackoffKind;

    use super::*;

    /// Validates `RuleRegistry::new` seeds every channel.
    ///
    /// Assertions:
    /// - Confirms `all()` returns one rule per channel in order.
    /// - Confirms each seeded rule matches the channel default.
    #[test]
    fn test_registry_seeds_all_channels() {
        let registry = RuleRegistry::new();
        let rules = registry.all();

        assert_eq!(rules.len(), Channel::ALL.len());
        for (rule, &channel) in rules.iter().zip(Channel::ALL.iter()) {
            assert_eq!(rule.channel, channel);
            assert_eq!(*rule, DeliveryRule::default_for(channel));
        }
    }

    /// Validates `update` merges and persists a partial change.
    ///
    /// Assertions:
    /// - Confirms the returned rule carries the update.
    /// - Confirms a subsequent `get` observes the new rule.
    #[test]
    fn test_update_persists() {
        let registry = RuleRegistry::new();

        let update = DeliveryRuleUpdate {
            max_retries: Some(7),
            backoff: Some(BackoffKind::Linear),
            ..DeliveryRuleUpdate::default()
        };

        let updated = registry.update(Channel::Push, update).unwrap();
        assert_eq!(updated.max_retries, 7);
        assert_eq!(updated.backoff, BackoffKind::Linear);

        let fetched = registry.get(Channel::Push);
        assert_eq!(fetched, updated);
    }

    /// Validates a rejected update leaves the active rule untouched.
    ///
    /// Assertions:
    /// - Ensures the invalid update errors.
    /// - Confirms `get` still returns the previous rule.
    #[test]
    fn test_invalid_update_rejected() {
        let registry = RuleRegistry::new();
        let before = registry.get(Channel::Email);

        let bad = DeliveryRuleUpdate {
            failure_threshold: Some(250.0),
            ..DeliveryRuleUpdate::default()
        };
        assert!(registry.update(Channel::Email, bad).is_err());

        assert_eq!(registry.get(Channel::Email), before);
    }

    /// Validates updates to one channel do not leak into another.
    ///
    /// Assertions:
    /// - Confirms the SMS rule is unchanged after an email update.
    #[test]
    fn test_update_is_per_channel() {
        let registry = RuleRegistry::new();

        let update = DeliveryRuleUpdate {
            retry_intervals: Some(vec![Duration::from_secs(1)]),
            ..DeliveryRuleUpdate::default()
        };
        registry.update(Channel::Email, update).unwrap();

        assert_eq!(registry.get(Channel::Sms), DeliveryRule::default_for(Channel::Sms));
    }
}
