//! Per-channel admission control.
//!
//! One [`ChannelAdmission`] instance bounds how many subscriptions of its
//! channel may be concurrently active against the publisher. Subscriptions
//! over the limit wait on a FIFO want list; released subscriptions that are
//! still online may linger in a deadline-ordered cache so a re-subscribe
//! reclaims them without a wire round trip. The cache is evicted oldest
//! first, either on its deadline, when its entry goes offline, or eagerly
//! to admit a new want.
//!
//! The controller mutates only its own three sets and reports every
//! consequence as an [`AdmissionChange`] for the engine to route, so a
//! whole tick's worth of changes can be bracketed into one batch downstream.

use sirocco_core::prelude::{ChannelConfig, ChannelKind, MonoTime, SubscriptionId};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

/// One consequence of an admission decision, routed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionChange {
    /// The subscription was granted an active slot.
    Activated(SubscriptionId),
    /// The subscription was queued on the want list at the given position.
    Queued(SubscriptionId, usize),
    /// The subscription lost its slot and must unwind.
    Deactivated(SubscriptionId),
    /// The released subscription was parked in the cache.
    Cached(SubscriptionId),
}

/// Counters describing a channel's current admission occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionStats {
    /// Subscriptions holding a slot with subscribers.
    pub kept: usize,
    /// Released subscriptions parked in the cache.
    pub cached: usize,
    /// Subscriptions waiting on the want list.
    pub queued: usize,
    /// Configured limit; -1 means unbounded.
    pub active_limit: i64,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    id: SubscriptionId,
    deadline: MonoTime,
}

/// Admission controller for one data channel.
///
/// Invariant: a subscription id is in at most one of the kept set, the want
/// list and the cache at any time.
#[derive(Debug)]
pub struct ChannelAdmission {
    kind: ChannelKind,
    active_limit: i64,
    caching_enabled: bool,
    cache_delay: Duration,
    kept: HashSet<SubscriptionId>,
    want: VecDeque<SubscriptionId>,
    /// Appended with a constant delay, so entries stay deadline-ordered.
    cached: VecDeque<CacheEntry>,
}

impl ChannelAdmission {
    /// Creates a controller for one channel from its configuration.
    #[must_use]
    pub fn new(kind: ChannelKind, config: &ChannelConfig) -> Self {
        Self {
            kind,
            active_limit: config.active_limit,
            caching_enabled: config.caching_enabled,
            cache_delay: config.deactivation_cache_delay,
            kept: HashSet::new(),
            want: VecDeque::new(),
            cached: VecDeque::new(),
        }
    }

    fn active_count(&self) -> usize {
        self.kept.len() + self.cached.len()
    }

    fn has_slot(&self) -> bool {
        self.active_limit < 0 || (self.active_count() as i64) < self.active_limit
    }

    fn caching_active(&self) -> bool {
        self.caching_enabled && !self.cache_delay.is_zero()
    }

    /// A subscription wants activation.
    ///
    /// Admits immediately under the limit; otherwise evicts the oldest
    /// cached subscription to make room, or queues on the want list.
    pub fn want_activation(&mut self, id: SubscriptionId) -> Vec<AdmissionChange> {
        if self.kept.contains(&id) {
            return Vec::new();
        }
        if self.has_slot() {
            self.kept.insert(id);
            return vec![AdmissionChange::Activated(id)];
        }
        if let Some(oldest) = self.cached.pop_front() {
            debug!(
                channel = %self.kind,
                evicted = %oldest.id,
                admitted = %id,
                "evicted oldest cached subscription for a new want"
            );
            self.kept.insert(id);
            return vec![
                AdmissionChange::Deactivated(oldest.id),
                AdmissionChange::Activated(id),
            ];
        }
        self.want.push_back(id);
        vec![AdmissionChange::Queued(id, self.want.len())]
    }

    /// The subscription's last subscriber left.
    ///
    /// With a non-empty want list the slot swaps straight to the head want;
    /// otherwise a cacheable subscription (online and reclaimable by key) is
    /// cached when caching is on, and deactivated immediately when it is not.
    pub fn available_for_deactivation(
        &mut self,
        id: SubscriptionId,
        cacheable: bool,
        now: MonoTime,
    ) -> Vec<AdmissionChange> {
        if !self.kept.remove(&id) {
            // Released before a slot was ever granted.
            self.want.retain(|queued| *queued != id);
            return Vec::new();
        }
        if let Some(head) = self.want.pop_front() {
            self.kept.insert(head);
            return vec![
                AdmissionChange::Deactivated(id),
                AdmissionChange::Activated(head),
            ];
        }
        if self.caching_active() && cacheable {
            self.cached.push_back(CacheEntry {
                id,
                deadline: now.saturating_add(self.cache_delay),
            });
            return vec![AdmissionChange::Cached(id)];
        }
        vec![AdmissionChange::Deactivated(id)]
    }

    /// Moves a cached subscription back into kept use.
    ///
    /// Returns false when the subscription is not currently cached.
    pub fn reclaim(&mut self, id: SubscriptionId) -> bool {
        let before = self.cached.len();
        self.cached.retain(|entry| entry.id != id);
        if self.cached.len() < before {
            self.kept.insert(id);
            debug!(channel = %self.kind, subscription = %id, "cached subscription reclaimed");
            true
        } else {
            false
        }
    }

    /// Tick entry point: evicts expired or offline cache entries and
    /// backfills freed slots from the want list in FIFO order.
    pub fn check_for_deactivations(
        &mut self,
        now: MonoTime,
        is_online: impl Fn(SubscriptionId) -> bool,
    ) -> Vec<AdmissionChange> {
        let mut changes = Vec::new();
        let mut keep = VecDeque::with_capacity(self.cached.len());
        for entry in self.cached.drain(..) {
            if now.has_reached(entry.deadline) || !is_online(entry.id) {
                changes.push(AdmissionChange::Deactivated(entry.id));
            } else {
                keep.push_back(entry);
            }
        }
        self.cached = keep;
        self.backfill(&mut changes);
        changes
    }

    /// Changes the active limit.
    ///
    /// Lowering it evicts the minimum number of cached subscriptions needed
    /// to satisfy the new limit, oldest first. Kept subscriptions are never
    /// force-evicted: when the kept count alone exceeds the limit the
    /// overshoot stands until subscribers release naturally.
    pub fn set_active_limit(&mut self, new_limit: i64) -> Vec<AdmissionChange> {
        self.active_limit = new_limit;
        let mut changes = Vec::new();
        if new_limit >= 0 {
            while self.active_count() as i64 > new_limit {
                let Some(oldest) = self.cached.pop_front() else {
                    break;
                };
                changes.push(AdmissionChange::Deactivated(oldest.id));
            }
            if self.kept.len() as i64 > new_limit {
                warn!(
                    channel = %self.kind,
                    kept = self.kept.len(),
                    limit = new_limit,
                    "kept subscriptions exceed the new limit; excess stands until released"
                );
            }
        }
        self.backfill(&mut changes);
        changes
    }

    /// Removes a subscription from whichever set holds it and backfills.
    ///
    /// Used when a subscription is destroyed or fails terminally, so the
    /// slot it held goes to the next want.
    pub fn release_slot(&mut self, id: SubscriptionId) -> Vec<AdmissionChange> {
        self.kept.remove(&id);
        self.want.retain(|queued| *queued != id);
        self.cached.retain(|entry| entry.id != id);
        let mut changes = Vec::new();
        self.backfill(&mut changes);
        changes
    }

    fn backfill(&mut self, changes: &mut Vec<AdmissionChange>) {
        while self.has_slot() {
            let Some(head) = self.want.pop_front() else {
                break;
            };
            self.kept.insert(head);
            changes.push(AdmissionChange::Activated(head));
        }
    }

    /// Returns the channel this controller serves.
    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Returns the current occupancy counters.
    #[must_use]
    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            kept: self.kept.len(),
            cached: self.cached.len(),
            queued: self.want.len(),
            active_limit: self.active_limit,
        }
    }
}
