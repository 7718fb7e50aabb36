//! The subscription entity.
//!
//! A [`Subscription`] couples an immutable [`DataDefinition`] with the
//! mutable lifecycle state the engine drives: how many subscribers hold it,
//! where it stands with the channel admission controller, where it stands in
//! the wire protocol, and the [`Badness`] derived from both. All mutation
//! happens through the protocol transitions in `protocol.rs` and the engine;
//! this module only defines the entity and its derived views.

use crate::events::{Outbox, SubscriptionNotice};
use serde::{Deserialize, Serialize};
use sirocco_core::prelude::{
    BadReason, Badness, DataDefinition, MonoTime, RequestNr, SubscriptionId,
};
use std::fmt;

/// Where a subscription stands with its channel's admission controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    /// Not yet presented to the admission controller.
    NotActive,
    /// Waiting on the channel's FIFO want list for a slot.
    WantActivation,
    /// Holding an active slot with at least one subscriber.
    Keep,
    /// Active with zero subscribers, parked in the cache until its deadline.
    Cached,
}

impl AdmissionState {
    /// Returns true while the subscription holds an active slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Keep | Self::Cached)
    }

    /// Returns the state as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotActive => "not_active",
            Self::WantActivation => "want_activation",
            Self::Keep => "keep",
            Self::Cached => "cached",
        }
    }
}

impl fmt::Display for AdmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a subscription stands in the activation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolState {
    /// No activation has ever been attempted.
    NeverSubscribed,
    /// Activation is wanted but the publisher connection is down.
    PublisherOnlineWaiting,
    /// The publisher declined; waiting for its capability to improve.
    SubscribabilityIncreaseWaiting,
    /// A retryable failure occurred; waiting out the backoff delay.
    RetryDelayWaiting,
    /// The publisher connection dropped while the subscription was live.
    PublisherOfflining,
    /// An activation request was issued; awaiting the first response.
    ResponseWaiting,
    /// The first response arrived; the initial image is streaming in.
    SynchronisationWaiting,
    /// The subscription's view matches the publisher's state.
    Synchronised,
    /// Synchronised, but an unsubscribe was issued concurrently.
    UnsubscribedSynchronised,
    /// Terminal failure; no recovery without a new subscription.
    Error,
}

impl ProtocolState {
    /// True in the states where delivered data can be trusted.
    ///
    /// Distinct from "good": a subscription can be good-for-its-state
    /// without being online (for example while queued).
    #[must_use]
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Synchronised | Self::UnsubscribedSynchronised)
    }

    /// True for the terminal error state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// True in the states reached only after an activation was issued and
    /// not yet unwound.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        matches!(
            self,
            Self::ResponseWaiting
                | Self::SynchronisationWaiting
                | Self::Synchronised
                | Self::UnsubscribedSynchronised
        )
    }

    /// Returns the state as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NeverSubscribed => "never_subscribed",
            Self::PublisherOnlineWaiting => "publisher_online_waiting",
            Self::SubscribabilityIncreaseWaiting => "subscribability_increase_waiting",
            Self::RetryDelayWaiting => "retry_delay_waiting",
            Self::PublisherOfflining => "publisher_offlining",
            Self::ResponseWaiting => "response_waiting",
            Self::SynchronisationWaiting => "synchronisation_waiting",
            Self::Synchronised => "synchronised",
            Self::UnsubscribedSynchronised => "unsubscribed_synchronised",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One logical subscription and all of its mutable lifecycle state.
///
/// Created on the first `subscribe()` for its definition (or definition key)
/// and destroyed when the last subscriber releases it *and* the admission
/// controller has completed its unwind. The id is unique for the life of the
/// engine and never reused.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    definition: DataDefinition,
    /// Subscribers currently holding a handle. 0→1 triggers admission,
    /// 1→0 triggers release.
    pub(crate) subscriber_count: u32,
    pub(crate) admission: AdmissionState,
    pub(crate) protocol: ProtocolState,
    badness: Badness,
    /// Number carried by the current activation; responses echoing any
    /// other value are stale and discarded.
    pub(crate) request_nr: RequestNr,
    /// Bumped whenever the subscription is released; cancels deferred
    /// work armed under an earlier epoch.
    pub(crate) lifecycle_epoch: u64,
    /// Bumped on every badness reason change; guards queued health notices
    /// against superseding changes during dispatch.
    pub(crate) health_epoch: u64,
    /// Consecutive failed activation attempts, reset on synchronisation.
    pub(crate) attempts: u32,
    /// When the next delay-retry activation is due.
    pub(crate) retry_due: Option<MonoTime>,
    /// Whether the publisher currently knows about this subscription, so an
    /// unwind must send a wire unsubscribe.
    pub(crate) registered: bool,
    /// The last subscriber left while a request was in flight; a real
    /// unsubscribe is owed once the exchange resolves or times out.
    pub(crate) unsubscribe_owed: bool,
    /// Destruction is waiting on the final unsubscribe leaving the wire.
    pub(crate) pending_destroy: bool,
}

impl Subscription {
    /// Creates a subscription for one subscriber in its initial state.
    #[must_use]
    pub(crate) fn new(id: SubscriptionId, definition: DataDefinition) -> Self {
        Self {
            id,
            definition,
            subscriber_count: 1,
            admission: AdmissionState::NotActive,
            protocol: ProtocolState::NeverSubscribed,
            badness: Badness::new(BadReason::NotSubscribed, "activation pending"),
            request_nr: RequestNr::ZERO,
            lifecycle_epoch: 0,
            health_epoch: 0,
            attempts: 0,
            retry_due: None,
            registered: false,
            unsubscribe_owed: false,
            pending_destroy: false,
        }
    }

    /// Returns the subscription's id.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the immutable definition.
    #[must_use]
    pub fn definition(&self) -> &DataDefinition {
        &self.definition
    }

    /// Returns the current badness.
    #[must_use]
    pub fn badness(&self) -> &Badness {
        &self.badness
    }

    /// Returns the current admission state.
    #[must_use]
    pub fn admission(&self) -> AdmissionState {
        self.admission
    }

    /// Returns the current protocol state.
    #[must_use]
    pub fn protocol(&self) -> ProtocolState {
        self.protocol
    }

    /// True when delivered data can currently be trusted.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.protocol.is_online()
    }

    /// True once the subscription is winding down and must not be shared.
    pub(crate) fn is_winding_down(&self) -> bool {
        self.unsubscribe_owed || self.pending_destroy
    }

    /// Applies a new badness, queueing change notices when the reason moved.
    ///
    /// Detail-only changes update the stored value silently; the engine
    /// notifies on reason transitions, never on detail strings. A reason
    /// change bumps the health epoch and the queued notices carry it, so a
    /// later change before dispatch supersedes them.
    pub(crate) fn apply_badness(&mut self, outbox: &mut Outbox, next: Badness) {
        if !next.differs_from(&self.badness) {
            self.badness = next;
            return;
        }
        let previous_tier = self.badness.correctness();
        let tier = next.correctness();
        self.health_epoch += 1;
        self.badness = next.clone();
        outbox.push_guarded(
            self.id,
            SubscriptionNotice::BadnessChanged(next),
            Some(self.health_epoch),
        );
        if tier != previous_tier {
            outbox.push_guarded(
                self.id,
                SubscriptionNotice::CorrectnessChanged(tier),
                Some(self.health_epoch),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirocco_core::prelude::{Correctness, Symbol};

    fn make_sub() -> Subscription {
        Subscription::new(
            SubscriptionId::new(1),
            DataDefinition::trades(Symbol::new_unchecked("BTC-USDT")),
        )
    }

    fn drain(outbox: &mut Outbox) -> Vec<SubscriptionNotice> {
        let mut out = Vec::new();
        while let Some(queued) = outbox.pop() {
            out.push(queued.notice);
        }
        out
    }

    #[test]
    fn test_initial_state() {
        let sub = make_sub();
        assert_eq!(sub.subscriber_count, 1);
        assert_eq!(sub.admission(), AdmissionState::NotActive);
        assert_eq!(sub.protocol(), ProtocolState::NeverSubscribed);
        assert_eq!(sub.badness().reason(), BadReason::NotSubscribed);
        assert_eq!(sub.request_nr, RequestNr::ZERO);
        assert!(!sub.is_online());
    }

    #[test]
    fn test_online_states() {
        assert!(ProtocolState::Synchronised.is_online());
        assert!(ProtocolState::UnsubscribedSynchronised.is_online());
        assert!(!ProtocolState::SynchronisationWaiting.is_online());
        assert!(!ProtocolState::ResponseWaiting.is_online());
        assert!(!ProtocolState::Error.is_online());
    }

    #[test]
    fn test_apply_badness_notifies_on_reason_change() {
        let mut sub = make_sub();
        let mut outbox = Outbox::new();

        sub.apply_badness(&mut outbox, Badness::new(BadReason::QueuedForSlot, "1 ahead"));
        let notices = drain(&mut outbox);
        // Same tier (unusable), so only the badness notice fires.
        assert_eq!(notices.len(), 3); // begin, badness, end
        assert!(matches!(notices[1], SubscriptionNotice::BadnessChanged(_)));
    }

    #[test]
    fn test_apply_badness_adds_correctness_notice_on_tier_change() {
        let mut sub = make_sub();
        let mut outbox = Outbox::new();

        sub.apply_badness(&mut outbox, Badness::good());
        let notices = drain(&mut outbox);
        assert!(notices.contains(&SubscriptionNotice::CorrectnessChanged(Correctness::Good)));
    }

    #[test]
    fn test_apply_badness_silent_on_detail_change() {
        let mut sub = make_sub();
        let mut outbox = Outbox::new();
        let epoch_before = sub.health_epoch;

        sub.apply_badness(
            &mut outbox,
            Badness::new(BadReason::NotSubscribed, "different wording"),
        );
        assert!(outbox.is_empty());
        assert_eq!(sub.health_epoch, epoch_before);
        assert_eq!(sub.badness().detail(), "different wording");
    }

    #[test]
    fn test_health_epoch_advances_per_reason_change() {
        let mut sub = make_sub();
        let mut outbox = Outbox::new();

        sub.apply_badness(&mut outbox, Badness::new(BadReason::AwaitingResponse, ""));
        sub.apply_badness(&mut outbox, Badness::good());
        assert_eq!(sub.health_epoch, 2);
    }

    #[test]
    fn test_admission_active_predicate() {
        assert!(AdmissionState::Keep.is_active());
        assert!(AdmissionState::Cached.is_active());
        assert!(!AdmissionState::WantActivation.is_active());
        assert!(!AdmissionState::NotActive.is_active());
    }
}
