//! Subscription notices and the engine outbox.
//!
//! Every externally visible change to a subscription is published as a
//! [`SubscriptionNotice`], and every burst of notices for one subscription
//! is wrapped in a `BeginChanges`/`EndChanges` bracket so consumers can
//! treat the burst as a single consistent update. Nested change scopes
//! coalesce into one outer bracket, and a bracket that ends up containing
//! no notices emits nothing at all.
//!
//! Notices are queued in the [`Outbox`] while the engine mutates state and
//! are dispatched to observers only after the mutation completes, which
//! keeps observer callbacks from ever seeing a half-updated engine.

use sirocco_core::prelude::{Badness, Correctness, FeedPayload, PublisherFault, SubscriptionId};
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// A change notice published to the observers of one subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionNotice {
    /// Opens a bracket of related changes.
    BeginChanges,
    /// The subscription's badness changed.
    BadnessChanged(Badness),
    /// The subscription's correctness tier changed.
    ///
    /// Follows a [`SubscriptionNotice::BadnessChanged`] whenever the new
    /// badness lands in a different tier than the old one.
    CorrectnessChanged(Correctness),
    /// Previously delivered data is invalid and must be discarded.
    ResetData,
    /// A feed payload arrived.
    Message(FeedPayload),
    /// The publisher reported a fault for this subscription.
    Fault(PublisherFault),
    /// The publisher connection was lost.
    PublisherOffline {
        /// Human-readable reason for the loss.
        reason: String,
    },
    /// The publisher connection was (re-)established.
    PublisherOnline,
    /// Closes a bracket of related changes.
    EndChanges,
}

impl SubscriptionNotice {
    /// Short tag for logging.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeginChanges => "begin_changes",
            Self::BadnessChanged(_) => "badness_changed",
            Self::CorrectnessChanged(_) => "correctness_changed",
            Self::ResetData => "reset_data",
            Self::Message(_) => "message",
            Self::Fault(_) => "fault",
            Self::PublisherOffline { .. } => "publisher_offline",
            Self::PublisherOnline => "publisher_online",
            Self::EndChanges => "end_changes",
        }
    }

    /// True for badness and correctness change notices.
    ///
    /// These are the notices subject to stale-suppression: a queued health
    /// notice is dropped at dispatch time when the subscription's health
    /// has moved on since it was queued.
    #[must_use]
    pub fn is_health_change(&self) -> bool {
        matches!(
            self,
            Self::BadnessChanged(_) | Self::CorrectnessChanged(_)
        )
    }
}

/// A queued notice with its dispatch guard.
#[derive(Debug, Clone)]
pub(crate) struct QueuedNotice {
    pub(crate) subscription: SubscriptionId,
    pub(crate) notice: SubscriptionNotice,
    /// Health epoch at queue time; `None` for non-health notices.
    ///
    /// Dispatch skips the notice when the subscription's current epoch no
    /// longer matches, so observers only ever see the latest health.
    pub(crate) guard: Option<u64>,
}

#[derive(Debug, Default)]
struct Bracket {
    depth: u32,
    /// Whether `BeginChanges` was actually emitted for this bracket.
    begun: bool,
}

/// Per-subscription bracketed notice queue.
///
/// Change scopes nest: only the outermost `open`/`close` pair emits the
/// `BeginChanges`/`EndChanges` notices, and `BeginChanges` is emitted
/// lazily on the first real notice so empty scopes stay silent.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    queue: VecDeque<QueuedNotice>,
    brackets: HashMap<SubscriptionId, Bracket>,
}

impl Outbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Opens (or nests into) a change scope for `subscription`.
    pub(crate) fn open(&mut self, subscription: SubscriptionId) {
        self.brackets.entry(subscription).or_default().depth += 1;
    }

    /// Closes one level of change scope for `subscription`.
    pub(crate) fn close(&mut self, subscription: SubscriptionId) {
        let Some(bracket) = self.brackets.get_mut(&subscription) else {
            warn!(subscription = %subscription, "change scope closed without open");
            return;
        };
        bracket.depth -= 1;
        if bracket.depth == 0 {
            if bracket.begun {
                self.queue.push_back(QueuedNotice {
                    subscription,
                    notice: SubscriptionNotice::EndChanges,
                    guard: None,
                });
            }
            self.brackets.remove(&subscription);
        }
    }

    /// Queues a notice inside the current change scope.
    ///
    /// Called outside any scope, the notice is wrapped in its own
    /// single-notice bracket.
    pub(crate) fn push(&mut self, subscription: SubscriptionId, notice: SubscriptionNotice) {
        self.push_guarded(subscription, notice, None);
    }

    /// Queues a health notice guarded by the epoch it was computed under.
    pub(crate) fn push_guarded(
        &mut self,
        subscription: SubscriptionId,
        notice: SubscriptionNotice,
        guard: Option<u64>,
    ) {
        if let Some(bracket) = self.brackets.get_mut(&subscription) {
            if !bracket.begun {
                bracket.begun = true;
                self.queue.push_back(QueuedNotice {
                    subscription,
                    notice: SubscriptionNotice::BeginChanges,
                    guard: None,
                });
            }
            self.queue.push_back(QueuedNotice {
                subscription,
                notice,
                guard,
            });
        } else {
            self.queue.push_back(QueuedNotice {
                subscription,
                notice: SubscriptionNotice::BeginChanges,
                guard: None,
            });
            self.queue.push_back(QueuedNotice {
                subscription,
                notice,
                guard,
            });
            self.queue.push_back(QueuedNotice {
                subscription,
                notice: SubscriptionNotice::EndChanges,
                guard: None,
            });
        }
    }

    /// Takes the next queued notice, oldest first.
    pub(crate) fn pop(&mut self) -> Option<QueuedNotice> {
        self.queue.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drops everything: queued notices and open scopes.
    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.brackets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(n: u64) -> SubscriptionId {
        SubscriptionId::new(n)
    }

    fn drain(outbox: &mut Outbox) -> Vec<(SubscriptionId, SubscriptionNotice)> {
        let mut out = Vec::new();
        while let Some(queued) = outbox.pop() {
            out.push((queued.subscription, queued.notice));
        }
        out
    }

    #[test]
    fn test_single_notice_is_bracketed() {
        let mut outbox = Outbox::new();
        outbox.open(sub(1));
        outbox.push(sub(1), SubscriptionNotice::ResetData);
        outbox.close(sub(1));

        let notices = drain(&mut outbox);
        assert_eq!(
            notices,
            vec![
                (sub(1), SubscriptionNotice::BeginChanges),
                (sub(1), SubscriptionNotice::ResetData),
                (sub(1), SubscriptionNotice::EndChanges),
            ]
        );
    }

    #[test]
    fn test_nested_scopes_coalesce_into_one_bracket() {
        let mut outbox = Outbox::new();
        outbox.open(sub(1));
        outbox.push(sub(1), SubscriptionNotice::ResetData);
        outbox.open(sub(1)); // nested scope
        outbox.push(sub(1), SubscriptionNotice::PublisherOnline);
        outbox.close(sub(1));
        outbox.push(sub(1), SubscriptionNotice::ResetData);
        outbox.close(sub(1));

        let notices = drain(&mut outbox);
        let begins = notices
            .iter()
            .filter(|(_, n)| *n == SubscriptionNotice::BeginChanges)
            .count();
        let ends = notices
            .iter()
            .filter(|(_, n)| *n == SubscriptionNotice::EndChanges)
            .count();
        assert_eq!(begins, 1);
        assert_eq!(ends, 1);
        assert_eq!(notices.first().map(|(_, n)| n.as_str()), Some("begin_changes"));
        assert_eq!(notices.last().map(|(_, n)| n.as_str()), Some("end_changes"));
    }

    #[test]
    fn test_empty_scope_emits_nothing() {
        let mut outbox = Outbox::new();
        outbox.open(sub(1));
        outbox.close(sub(1));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_push_outside_scope_wraps_itself() {
        let mut outbox = Outbox::new();
        outbox.push(sub(2), SubscriptionNotice::PublisherOnline);

        let notices = drain(&mut outbox);
        assert_eq!(notices.len(), 3);
        assert_eq!(notices[0].1, SubscriptionNotice::BeginChanges);
        assert_eq!(notices[2].1, SubscriptionNotice::EndChanges);
    }

    #[test]
    fn test_brackets_are_per_subscription() {
        let mut outbox = Outbox::new();
        outbox.open(sub(1));
        outbox.open(sub(2));
        outbox.push(sub(1), SubscriptionNotice::ResetData);
        outbox.push(sub(2), SubscriptionNotice::ResetData);
        outbox.close(sub(2));
        outbox.close(sub(1));

        let notices = drain(&mut outbox);
        let for_one: Vec<_> = notices.iter().filter(|(s, _)| *s == sub(1)).collect();
        let for_two: Vec<_> = notices.iter().filter(|(s, _)| *s == sub(2)).collect();
        assert_eq!(for_one.len(), 3);
        assert_eq!(for_two.len(), 3);
    }

    #[test]
    fn test_guard_rides_along() {
        let mut outbox = Outbox::new();
        outbox.open(sub(1));
        outbox.push_guarded(
            sub(1),
            SubscriptionNotice::CorrectnessChanged(Correctness::Good),
            Some(7),
        );
        outbox.close(sub(1));

        let mut guards = Vec::new();
        while let Some(queued) = outbox.pop() {
            guards.push(queued.guard);
        }
        assert_eq!(guards, vec![None, Some(7), None]);
    }

    #[test]
    fn test_health_change_classification() {
        assert!(SubscriptionNotice::BadnessChanged(Badness::good()).is_health_change());
        assert!(SubscriptionNotice::CorrectnessChanged(Correctness::Good).is_health_change());
        assert!(!SubscriptionNotice::ResetData.is_health_change());
        assert!(!SubscriptionNotice::BeginChanges.is_health_change());
    }

    #[test]
    fn test_clear_drops_open_scopes() {
        let mut outbox = Outbox::new();
        outbox.open(sub(1));
        outbox.push(sub(1), SubscriptionNotice::ResetData);
        outbox.clear();
        assert!(outbox.is_empty());
        // A fresh push after clear wraps itself; the stale scope is gone.
        outbox.push(sub(1), SubscriptionNotice::ResetData);
        assert_eq!(outbox.len(), 3);
    }
}
