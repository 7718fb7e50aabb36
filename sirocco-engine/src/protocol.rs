//! Protocol state machine transitions.
//!
//! Each function here drives one [`Subscription`] through a single edge of
//! its protocol state enumeration: activation, first response, sync
//! completion, fault branching, timeout, offline/online. Every transition
//! recomputes badness from the fixed state table and queues its notices
//! through the [`Outbox`], so all externally visible effects of one edge
//! land inside the caller's change bracket.
//!
//! The transitions never talk to the wire themselves; they return a
//! [`WireDirective`] and the engine turns it into an outbound request. That
//! keeps every function here synchronous and side-effect-free beyond the
//! subscription and the outbox.

use crate::events::{Outbox, SubscriptionNotice};
use crate::retry::RetryPolicy;
use crate::subscription::{AdmissionState, ProtocolState, Subscription};
use sirocco_core::prelude::{BadReason, Badness, FeedPayload, MonoTime, PublisherFault};
use tracing::{debug, info, warn};

/// Wire action a transition asks the engine to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WireDirective {
    /// Send an activation carrying the subscription's current request nr.
    SendActivate,
    /// Send an unsubscribe for the subscription.
    SendUnsubscribe,
}

/// Shared context for one burst of protocol transitions.
///
/// Borrowed fresh from the engine for every entry point; carries the clock
/// snapshot of the current tick and whether the publisher connection is up.
pub(crate) struct ProtocolCtx<'a> {
    pub outbox: &'a mut Outbox,
    pub retry: &'a RetryPolicy,
    pub publisher_online: bool,
    pub now: MonoTime,
}

impl ProtocolCtx<'_> {
    /// The admission controller granted an active slot.
    ///
    /// Activates immediately when the publisher is up, otherwise parks the
    /// subscription until the connection comes online.
    pub(crate) fn grant_activation(&mut self, sub: &mut Subscription) -> Option<WireDirective> {
        sub.admission = AdmissionState::Keep;
        if self.publisher_online {
            Some(self.activate(sub))
        } else {
            sub.protocol = ProtocolState::PublisherOnlineWaiting;
            sub.apply_badness(
                self.outbox,
                Badness::new(BadReason::WaitingForPublisher, "publisher offline"),
            );
            None
        }
    }

    /// The admission controller queued the subscription on the want list.
    pub(crate) fn park_queued(&mut self, sub: &mut Subscription, position: usize) {
        sub.admission = AdmissionState::WantActivation;
        sub.apply_badness(
            self.outbox,
            Badness::new(BadReason::QueuedForSlot, format!("position {position}")),
        );
    }

    /// Issues a (re)activation: advances the request number and enters
    /// `ResponseWaiting`.
    ///
    /// Advancing the number here is what invalidates every response still
    /// in flight for the superseded activation.
    pub(crate) fn activate(&mut self, sub: &mut Subscription) -> WireDirective {
        sub.request_nr = sub.request_nr.next();
        sub.protocol = ProtocolState::ResponseWaiting;
        sub.registered = true;
        sub.retry_due = None;
        debug!(
            subscription = %sub.id(),
            request_nr = %sub.request_nr,
            definition = %sub.definition(),
            "activation issued"
        );
        sub.apply_badness(
            self.outbox,
            Badness::new(BadReason::AwaitingResponse, "activation sent"),
        );
        WireDirective::SendActivate
    }

    /// First response of the current activation arrived.
    ///
    /// Fires the pre-online data reset exactly once per activation cycle,
    /// strictly before any payload of that cycle is delivered.
    pub(crate) fn first_response(&mut self, sub: &mut Subscription) {
        debug_assert_eq!(sub.protocol, ProtocolState::ResponseWaiting);
        sub.protocol = ProtocolState::SynchronisationWaiting;
        self.outbox.push(sub.id(), SubscriptionNotice::ResetData);
        sub.apply_badness(
            self.outbox,
            Badness::new(BadReason::Synchronising, "initial image streaming"),
        );
    }

    /// Delivers one decoded payload to the subscription's observers.
    pub(crate) fn apply_data(&mut self, sub: &Subscription, payload: FeedPayload) {
        self.outbox
            .push(sub.id(), SubscriptionNotice::Message(payload));
    }

    /// The publisher signalled the initial image is complete.
    pub(crate) fn sync_complete(&mut self, sub: &mut Subscription) {
        sub.protocol = if sub.unsubscribe_owed {
            ProtocolState::UnsubscribedSynchronised
        } else {
            ProtocolState::Synchronised
        };
        sub.attempts = 0;
        info!(subscription = %sub.id(), definition = %sub.definition(), "synchronised");
        sub.apply_badness(self.outbox, Badness::good());
    }

    /// The publisher reported a subscription fault; branches on the retry
    /// directive the publisher declared.
    pub(crate) fn fault(&mut self, sub: &mut Subscription, fault: &PublisherFault) {
        use sirocco_core::prelude::RetryDirective;

        warn!(subscription = %sub.id(), fault = %fault, "publisher fault");
        self.outbox
            .push(sub.id(), SubscriptionNotice::Fault(fault.clone()));
        sub.registered = false;

        match fault.retry {
            RetryDirective::Never => self.fail(sub, fault.message.clone()),
            RetryDirective::Delay => self.schedule_retry(sub, &fault.message),
            RetryDirective::SubscribabilityIncrease => {
                sub.protocol = ProtocolState::SubscribabilityIncreaseWaiting;
                sub.apply_badness(
                    self.outbox,
                    Badness::new(BadReason::WaitingForCapability, fault.message.clone()),
                );
            }
        }
    }

    /// An activation deadline elapsed with no response.
    ///
    /// Resolves through the delay-retry path unless the definition disallows
    /// resending, in which case the subscription fails terminally. The
    /// publisher may still have received the request, so `registered` is
    /// left standing and an owed unsubscribe still goes out.
    pub(crate) fn timeout(&mut self, sub: &mut Subscription) {
        warn!(
            subscription = %sub.id(),
            request_nr = %sub.request_nr,
            "activation response timed out"
        );
        if sub.definition().resend_on_timeout {
            self.schedule_retry(sub, "request timed out");
        } else {
            self.fail(sub, "request timed out, resend disallowed");
        }
    }

    /// Re-activates once a delay-retry deadline has been reached.
    pub(crate) fn retry_elapsed(&mut self, sub: &mut Subscription) -> Option<WireDirective> {
        if sub.protocol != ProtocolState::RetryDelayWaiting {
            return None;
        }
        let due = sub.retry_due?;
        if !self.now.has_reached(due) {
            return None;
        }
        debug!(subscription = %sub.id(), attempt = sub.attempts, "retry delay elapsed");
        Some(self.activate(sub))
    }

    /// Re-activates a subscription parked on publisher capability.
    pub(crate) fn subscribability_increased(
        &mut self,
        sub: &mut Subscription,
    ) -> Option<WireDirective> {
        if sub.protocol != ProtocolState::SubscribabilityIncreaseWaiting {
            return None;
        }
        info!(subscription = %sub.id(), "capability improved, re-activating");
        Some(self.activate(sub))
    }

    /// Demotes the subscription for a lost publisher connection.
    ///
    /// Every subscription receives the offline notice; only those with an
    /// activation standing (or pending) are demoted to `PublisherOfflining`.
    /// Inactive and terminal subscriptions keep their state and badness.
    pub(crate) fn go_offline(&mut self, sub: &mut Subscription, reason: &str) {
        self.outbox.push(
            sub.id(),
            SubscriptionNotice::PublisherOffline {
                reason: reason.to_string(),
            },
        );
        sub.registered = false;
        sub.retry_due = None;
        match sub.protocol {
            ProtocolState::NeverSubscribed | ProtocolState::Error => {}
            _ => {
                sub.protocol = ProtocolState::PublisherOfflining;
                sub.apply_badness(
                    self.outbox,
                    Badness::new(BadReason::PublisherOffline, reason),
                );
            }
        }
    }

    /// Re-enters activation after the publisher connection is restored.
    pub(crate) fn come_online(&mut self, sub: &mut Subscription) -> Option<WireDirective> {
        self.outbox.push(sub.id(), SubscriptionNotice::PublisherOnline);
        sub.attempts = 0;
        match sub.protocol {
            ProtocolState::PublisherOfflining | ProtocolState::PublisherOnlineWaiting
                if sub.admission.is_active() =>
            {
                Some(self.activate(sub))
            }
            _ => {
                if sub.admission == AdmissionState::WantActivation {
                    sub.apply_badness(
                        self.outbox,
                        Badness::new(BadReason::QueuedForSlot, "waiting for slot"),
                    );
                }
                None
            }
        }
    }

    /// Unwinds an activation the admission controller has deactivated.
    ///
    /// Returns the unsubscribe directive when the publisher has to be told;
    /// a subscription the publisher never learned about unwinds silently.
    pub(crate) fn deactivate(&mut self, sub: &mut Subscription) -> Option<WireDirective> {
        sub.admission = AdmissionState::NotActive;
        sub.retry_due = None;
        if sub.registered {
            sub.registered = false;
            debug!(subscription = %sub.id(), "deactivated, unsubscribe owed to publisher");
            Some(WireDirective::SendUnsubscribe)
        } else {
            debug!(subscription = %sub.id(), "deactivated without wire unwind");
            None
        }
    }

    /// Moves the subscription to its terminal error state.
    pub(crate) fn fail(&mut self, sub: &mut Subscription, detail: impl Into<String>) {
        let detail = detail.into();
        warn!(subscription = %sub.id(), detail = %detail, "subscription failed terminally");
        sub.protocol = ProtocolState::Error;
        sub.registered = false;
        sub.retry_due = None;
        sub.apply_badness(self.outbox, Badness::new(BadReason::FeedFault, detail));
    }

    /// Purges the subscription after an engine invariant violation.
    pub(crate) fn purge(&mut self, sub: &mut Subscription, detail: &str) {
        sub.protocol = ProtocolState::Error;
        sub.registered = false;
        sub.retry_due = None;
        sub.apply_badness(self.outbox, Badness::new(BadReason::Internal, detail));
    }

    /// Delay-retry branch shared by faults and timeouts: schedules the next
    /// activation, or fails when the policy is exhausted or disabled.
    fn schedule_retry(&mut self, sub: &mut Subscription, cause: &str) {
        sub.attempts += 1;
        match self.retry.delay_for(sub.attempts) {
            Some(delay) => {
                sub.protocol = ProtocolState::RetryDelayWaiting;
                sub.retry_due = Some(self.now.saturating_add(delay));
                sub.apply_badness(
                    self.outbox,
                    Badness::new(
                        BadReason::RetryPending,
                        format!("{cause} (attempt {})", sub.attempts),
                    ),
                );
            }
            None => self.fail(sub, format!("{cause} (retry exhausted)")),
        }
    }
}
