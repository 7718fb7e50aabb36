//! The feed engine orchestrator.
//!
//! [`FeedEngine`] owns every subscription known to one publisher connection
//! and wires the other components together: admission decisions flow into
//! protocol transitions, protocol transitions flow into wire requests, and
//! inbound messages flow back to the owning subscription. It also owns the
//! subscription-by-id and subscription-by-key registries; no other component
//! touches them.
//!
//! All mutation happens on one logical timeline. The engine guards against
//! reentrancy, not parallelism: observer callbacks may synchronously call
//! back into the engine, so notices are dispatched only after the outermost
//! update scope closes and handler lists are snapshotted before invocation.
//!
//! The engine never reads a clock. The host drives it through
//! [`FeedEngine::tick`], which is the only source of timeout detection,
//! cache expiry, retry scheduling and request sending.

use crate::admission::{AdmissionChange, AdmissionStats, ChannelAdmission};
use crate::events::{Outbox, SubscriptionNotice};
use crate::observer::{ObserverSet, ObserverToken};
use crate::protocol::{ProtocolCtx, WireDirective};
use crate::retry::RetryPolicy;
use crate::subscription::{AdmissionState, ProtocolState, Subscription};
use crate::wire::{RequestTransport, WireManager};
use sirocco_core::error::{InternalError, Result};
use sirocco_core::prelude::{
    Badness, ChannelKind, DataDefinition, FeedConfig, FeedKey, MessageBody, MonoTime,
    OutboundRequest, PublisherMessage, RequestNr, SubscriptionId,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, warn};

/// Opaque handle returned by [`FeedEngine::subscribe`].
///
/// Handles to a shared (referencable) subscription compare equal; each one
/// still represents a distinct subscriber and must be released with its own
/// [`FeedEngine::unsubscribe`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
}

impl SubscriptionHandle {
    /// The id of the underlying subscription.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Point-in-time view of one subscription's state.
#[derive(Debug, Clone)]
pub struct SubscriptionSnapshot {
    /// The subscription's id.
    pub id: SubscriptionId,
    /// The immutable definition.
    pub definition: DataDefinition,
    /// Admission state at snapshot time.
    pub admission: AdmissionState,
    /// Protocol state at snapshot time.
    pub protocol: ProtocolState,
    /// Badness at snapshot time.
    pub badness: Badness,
    /// Subscribers currently holding the subscription.
    pub subscriber_count: u32,
    /// Request number of the current activation.
    pub request_nr: RequestNr,
}

#[derive(Debug, Clone, Copy)]
enum DeferredAction {
    /// Present the subscription to its admission controller.
    Admit,
    /// Pull the subscription back out of the deactivation cache.
    Reclaim,
}

/// One-shot action armed by `subscribe()` and drained on the next tick.
///
/// Deferring the first transition gives the caller one scheduling quantum to
/// attach observers before anything can fire; the epoch cancels the action
/// when the subscription is released before the tick arrives.
#[derive(Debug, Clone, Copy)]
struct Deferred {
    id: SubscriptionId,
    epoch: u64,
    action: DeferredAction,
}

/// Subscription engine for one publisher connection.
pub struct FeedEngine<T: RequestTransport> {
    config: FeedConfig,
    retry: RetryPolicy,
    wire: WireManager<T>,
    subs: HashMap<SubscriptionId, Subscription>,
    by_key: HashMap<FeedKey, SubscriptionId>,
    channels: BTreeMap<ChannelKind, ChannelAdmission>,
    observers: ObserverSet<Self, SubscriptionNotice>,
    outbox: Outbox,
    deferred: Vec<Deferred>,
    next_id: u64,
    now: MonoTime,
    publisher_online: bool,
    update_depth: u32,
    dispatching: bool,
}

impl<T: RequestTransport> FeedEngine<T> {
    /// Creates an engine over a transport.
    ///
    /// The engine starts with the publisher considered offline; call
    /// [`Self::come_online`] once the connection is up.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `config` fails validation.
    pub fn new(config: FeedConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let wire = WireManager::new(transport, &config.wire);
        let channels = Self::build_channels(&config);
        Ok(Self {
            config,
            retry: RetryPolicy::with_defaults(),
            wire,
            subs: HashMap::new(),
            by_key: HashMap::new(),
            channels,
            observers: ObserverSet::new(),
            outbox: Outbox::new(),
            deferred: Vec::new(),
            next_id: 1,
            now: MonoTime::ZERO,
            publisher_online: false,
            update_depth: 0,
            dispatching: false,
        })
    }

    fn build_channels(config: &FeedConfig) -> BTreeMap<ChannelKind, ChannelAdmission> {
        ChannelKind::ALL
            .into_iter()
            .map(|kind| (kind, ChannelAdmission::new(kind, config.channel_config(kind))))
            .collect()
    }

    /// Replaces the re-activation backoff policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Subscribes to a feed.
    ///
    /// A referencable definition whose key matches a live subscription
    /// shares it; the returned handle then points at the existing
    /// subscription and no new wire request results. Activation of a new
    /// subscription is deferred to the next tick so the caller can attach
    /// observers before the first transition.
    pub fn subscribe(&mut self, definition: DataDefinition) -> SubscriptionHandle {
        self.begin_scope();
        let shared = definition
            .key()
            .and_then(|key| self.by_key.get(&key).copied());

        let mut handle = None;
        if let Some(existing) = shared {
            if let Some(sub) = self.subs.get_mut(&existing) {
                if !sub.is_winding_down() {
                    sub.subscriber_count += 1;
                    debug!(
                        subscription = %existing,
                        subscribers = sub.subscriber_count,
                        "subscription shared by key"
                    );
                    if sub.admission() == AdmissionState::Cached {
                        self.deferred.push(Deferred {
                            id: existing,
                            epoch: sub.lifecycle_epoch,
                            action: DeferredAction::Reclaim,
                        });
                    }
                    handle = Some(SubscriptionHandle { id: existing });
                }
            }
        }

        let handle = handle.unwrap_or_else(|| self.create_subscription(definition));
        self.end_scope();
        handle
    }

    fn create_subscription(&mut self, definition: DataDefinition) -> SubscriptionHandle {
        let id = SubscriptionId::new(self.next_id);
        self.next_id += 1;
        if let Some(key) = definition.key() {
            self.by_key.insert(key, id);
        }
        info!(subscription = %id, definition = %definition, "subscription created");
        let sub = Subscription::new(id, definition);
        self.deferred.push(Deferred {
            id,
            epoch: sub.lifecycle_epoch,
            action: DeferredAction::Admit,
        });
        self.subs.insert(id, sub);
        SubscriptionHandle { id }
    }

    /// Releases one subscriber of a subscription.
    ///
    /// When the last subscriber leaves, the subscription is released to its
    /// admission controller; destruction is asynchronous when a wire unwind
    /// (cached lingering, in-flight resolution, unsubscribe send) is still
    /// owed.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the handle's subscription is unknown,
    /// which indicates an unbalanced unsubscribe by the host.
    pub fn unsubscribe(&mut self, handle: &SubscriptionHandle) -> Result<()> {
        let id = handle.id;
        let Some(sub) = self.subs.get_mut(&id) else {
            return Err(InternalError::unknown(id, "unsubscribe").into());
        };
        if sub.subscriber_count > 1 {
            sub.subscriber_count -= 1;
            debug!(subscription = %id, subscribers = sub.subscriber_count, "subscriber released");
            return Ok(());
        }
        sub.subscriber_count = 0;
        sub.lifecycle_epoch += 1;
        let admission = sub.admission();
        let online = sub.is_online();
        let in_flight = sub.protocol() == ProtocolState::ResponseWaiting;
        let kind = sub.definition().channel();
        let referencable = sub.definition().referencable;
        debug!(subscription = %id, admission = %admission, "last subscriber released");

        self.begin_scope();
        match admission {
            AdmissionState::NotActive | AdmissionState::WantActivation => {
                // Never sent to the publisher; unwinds locally.
                self.destroy(id);
            }
            AdmissionState::Keep => {
                if in_flight {
                    // The in-flight exchange is not aborted; a real
                    // unsubscribe goes out once it resolves or times out.
                    if let Some(sub) = self.subs.get_mut(&id) {
                        sub.unsubscribe_owed = true;
                    }
                } else {
                    let now = self.now;
                    // Only referencable subscriptions can ever be reclaimed,
                    // so private ones unwind instead of occupying the cache.
                    let cacheable = online && referencable;
                    let changes = self
                        .channel_mut(kind)
                        .available_for_deactivation(id, cacheable, now);
                    self.route_admission(changes);
                }
            }
            AdmissionState::Cached => {
                // Re-subscribed from the cache and released again before the
                // reclaim ticked; the epoch bump above cancelled the reclaim
                // and the cache deadline unwinds the entry as usual.
                debug!(subscription = %id, "released back into deactivation cache");
            }
        }
        self.end_scope();
        Ok(())
    }

    /// Attaches a notice observer to a subscription.
    pub fn attach_observer<F>(&mut self, handle: &SubscriptionHandle, handler: F) -> ObserverToken
    where
        F: FnMut(&mut Self, &SubscriptionNotice) + Send + 'static,
    {
        self.observers.attach(handle.id, handler)
    }

    /// Detaches a previously attached observer.
    pub fn detach_observer(&mut self, token: &ObserverToken) -> bool {
        self.observers.detach(token)
    }

    /// Routes one decoded inbound message to its subscription.
    ///
    /// Messages for unknown subscriptions are dropped with a warning (a
    /// legitimate race after a timeout-driven unsubscribe); messages echoing
    /// a stale request number are discarded silently.
    pub fn handle_message(&mut self, message: PublisherMessage) {
        let id = message.subscription;
        {
            let Some(sub) = self.subs.get(&id) else {
                warn!(subscription = %id, "message for unknown subscription dropped");
                return;
            };
            if message.request_nr != sub.request_nr {
                debug!(
                    subscription = %id,
                    echoed = %message.request_nr,
                    current = %sub.request_nr,
                    "stale response discarded"
                );
                return;
            }
        }

        self.begin_scope();
        self.outbox.open(id);
        let owed = self.subs.get(&id).is_some_and(|s| s.unsubscribe_owed);
        if owed {
            // Any response resolves the in-flight exchange; the subscriber
            // is gone, so the subscription unwinds instead of progressing.
            if matches!(message.body, MessageBody::Fault(_)) {
                // The publisher rejected the request itself, so it holds no
                // registration to unsubscribe from.
                if let Some(sub) = self.subs.get_mut(&id) {
                    sub.registered = false;
                }
            }
            self.resolve_owed(id, matches!(message.body, MessageBody::SyncComplete));
        } else {
            match message.body {
                MessageBody::Data(payload) => {
                    if let Some(sub) = self.subs.get_mut(&id) {
                        let mut ctx = ProtocolCtx {
                            outbox: &mut self.outbox,
                            retry: &self.retry,
                            publisher_online: self.publisher_online,
                            now: self.now,
                        };
                        if sub.protocol() == ProtocolState::ResponseWaiting {
                            ctx.first_response(sub);
                        }
                        if sub.protocol().is_activated() {
                            ctx.apply_data(sub, payload);
                        } else {
                            warn!(subscription = %id, state = %sub.protocol(), "data in inapplicable state dropped");
                        }
                    }
                }
                MessageBody::SyncComplete => {
                    if let Some(sub) = self.subs.get_mut(&id) {
                        let mut ctx = ProtocolCtx {
                            outbox: &mut self.outbox,
                            retry: &self.retry,
                            publisher_online: self.publisher_online,
                            now: self.now,
                        };
                        if sub.protocol() == ProtocolState::ResponseWaiting {
                            ctx.first_response(sub);
                        }
                        if sub.protocol() == ProtocolState::SynchronisationWaiting {
                            ctx.sync_complete(sub);
                        } else {
                            warn!(subscription = %id, state = %sub.protocol(), "sync signal in inapplicable state");
                        }
                    }
                }
                MessageBody::Fault(fault) => {
                    if let Some(sub) = self.subs.get_mut(&id) {
                        let mut ctx = ProtocolCtx {
                            outbox: &mut self.outbox,
                            retry: &self.retry,
                            publisher_online: self.publisher_online,
                            now: self.now,
                        };
                        ctx.fault(sub, &fault);
                    }
                    self.release_if_terminal(id);
                }
            }
        }
        self.outbox.close(id);
        self.end_scope();
    }

    /// Drives the engine's periodic work.
    ///
    /// Phases, in order: deferred admissions and reclaims, due delay
    /// retries, cache expiry sweeps (batched on the wire), the response
    /// timeout scan, and finally the send pump.
    ///
    /// # Errors
    ///
    /// A transport failure purges every subscription with an internal
    /// badness and propagates as a wire error; the engine is consistent but
    /// empty of active state afterwards.
    pub fn tick(&mut self, now: MonoTime) -> Result<()> {
        self.now = now;
        self.begin_scope();

        for deferred in std::mem::take(&mut self.deferred) {
            let Some(sub) = self.subs.get(&deferred.id) else {
                continue;
            };
            if sub.lifecycle_epoch != deferred.epoch {
                debug!(subscription = %deferred.id, "deferred action cancelled by release");
                continue;
            }
            let kind = sub.definition().channel();
            match deferred.action {
                DeferredAction::Admit => {
                    let changes = self.channel_mut(kind).want_activation(deferred.id);
                    self.route_admission(changes);
                }
                DeferredAction::Reclaim => {
                    if self.channel_mut(kind).reclaim(deferred.id) {
                        if let Some(sub) = self.subs.get_mut(&deferred.id) {
                            sub.admission = AdmissionState::Keep;
                        }
                        debug!(subscription = %deferred.id, "cached subscription reclaimed");
                    }
                }
            }
        }

        let due: Vec<SubscriptionId> = self
            .subs
            .iter()
            .filter(|(_, sub)| {
                sub.protocol() == ProtocolState::RetryDelayWaiting
                    && sub.retry_due.is_some_and(|deadline| now.has_reached(deadline))
            })
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            let directive = match self.subs.get_mut(&id) {
                Some(sub) => {
                    self.outbox.open(id);
                    let directive = ProtocolCtx {
                        outbox: &mut self.outbox,
                        retry: &self.retry,
                        publisher_online: self.publisher_online,
                        now: self.now,
                    }
                    .retry_elapsed(sub);
                    self.outbox.close(id);
                    directive
                }
                None => None,
            };
            if let Some(directive) = directive {
                self.apply_directive(id, directive);
            }
        }

        self.wire.begin_batch();
        for kind in ChannelKind::ALL {
            let changes = {
                let subs = &self.subs;
                match self.channels.get_mut(&kind) {
                    Some(channel) => channel.check_for_deactivations(now, |id| {
                        subs.get(&id).is_some_and(Subscription::is_online)
                    }),
                    None => Vec::new(),
                }
            };
            self.route_admission(changes);
        }
        self.wire.end_batch();

        for expired in self.wire.take_expired(now) {
            let id = expired.subscription;
            let Some(sub) = self.subs.get(&id) else {
                continue;
            };
            if expired.request_nr != sub.request_nr {
                continue;
            }
            self.outbox.open(id);
            if sub.unsubscribe_owed {
                self.resolve_owed(id, false);
            } else {
                if let Some(sub) = self.subs.get_mut(&id) {
                    ProtocolCtx {
                        outbox: &mut self.outbox,
                        retry: &self.retry,
                        publisher_online: self.publisher_online,
                        now: self.now,
                    }
                    .timeout(sub);
                }
                self.release_if_terminal(id);
            }
            self.outbox.close(id);
        }

        let pump_result = self.wire.pump(now);
        match pump_result {
            Ok(sent) => {
                for request in sent {
                    if request.is_unsubscribe()
                        && self
                            .subs
                            .get(&request.subscription)
                            .is_some_and(|s| s.pending_destroy)
                    {
                        self.destroy(request.subscription);
                    }
                }
            }
            Err(wire_error) => {
                self.purge_all(&wire_error.to_string());
                self.end_scope();
                return Err(wire_error.into());
            }
        }
        self.end_scope();
        Ok(())
    }

    /// Demotes every subscription for a lost publisher connection and
    /// clears all queued and in-flight wire state.
    pub fn go_offline(&mut self, reason: &str) {
        info!(reason, "publisher offline");
        self.publisher_online = false;
        self.begin_scope();
        self.wire.clear();
        let ids: Vec<SubscriptionId> = self.subs.keys().copied().collect();
        let mut unwound = Vec::new();
        for id in ids {
            if let Some(sub) = self.subs.get_mut(&id) {
                self.outbox.open(id);
                ProtocolCtx {
                    outbox: &mut self.outbox,
                    retry: &self.retry,
                    publisher_online: false,
                    now: self.now,
                }
                .go_offline(sub, reason);
                if sub.unsubscribe_owed || sub.pending_destroy {
                    // Nothing left to unsubscribe from; a pending unwind
                    // whose queued Unsubscribe was just cleared completes
                    // here instead of at the pump.
                    sub.unsubscribe_owed = false;
                    sub.pending_destroy = false;
                    unwound.push(id);
                }
                self.outbox.close(id);
            }
        }
        for id in unwound {
            self.destroy(id);
        }
        self.end_scope();
    }

    /// Re-enters the activation path for every subscription after the
    /// publisher connection is restored.
    pub fn come_online(&mut self) {
        info!("publisher online");
        self.publisher_online = true;
        self.begin_scope();
        let ids: Vec<SubscriptionId> = self.subs.keys().copied().collect();
        for id in ids {
            let directive = match self.subs.get_mut(&id) {
                Some(sub) => {
                    self.outbox.open(id);
                    let directive = ProtocolCtx {
                        outbox: &mut self.outbox,
                        retry: &self.retry,
                        publisher_online: true,
                        now: self.now,
                    }
                    .come_online(sub);
                    self.outbox.close(id);
                    directive
                }
                None => None,
            };
            if let Some(directive) = directive {
                self.apply_directive(id, directive);
            }
        }
        self.end_scope();
    }

    /// Re-activates every subscription parked on publisher capability.
    pub fn subscribability_increased(&mut self) {
        self.begin_scope();
        let ids: Vec<SubscriptionId> = self.subs.keys().copied().collect();
        for id in ids {
            let directive = match self.subs.get_mut(&id) {
                Some(sub) => {
                    self.outbox.open(id);
                    let directive = ProtocolCtx {
                        outbox: &mut self.outbox,
                        retry: &self.retry,
                        publisher_online: self.publisher_online,
                        now: self.now,
                    }
                    .subscribability_increased(sub);
                    self.outbox.close(id);
                    directive
                }
                None => None,
            };
            if let Some(directive) = directive {
                self.apply_directive(id, directive);
            }
        }
        self.end_scope();
    }

    /// Changes a channel's active limit at runtime.
    ///
    /// Lowering the limit evicts cached subscriptions only; kept
    /// subscriptions above the new limit stand until naturally released.
    pub fn set_active_limit(&mut self, kind: ChannelKind, limit: i64) {
        self.begin_scope();
        self.wire.begin_batch();
        let changes = self.channel_mut(kind).set_active_limit(limit);
        self.route_admission(changes);
        self.wire.end_batch();
        self.end_scope();
    }

    /// Returns a snapshot of one subscription, or `None` once destroyed.
    #[must_use]
    pub fn snapshot(&self, handle: &SubscriptionHandle) -> Option<SubscriptionSnapshot> {
        self.subs.get(&handle.id).map(|sub| SubscriptionSnapshot {
            id: sub.id(),
            definition: sub.definition().clone(),
            admission: sub.admission(),
            protocol: sub.protocol(),
            badness: sub.badness().clone(),
            subscriber_count: sub.subscriber_count,
            request_nr: sub.request_nr,
        })
    }

    /// Returns admission occupancy for one channel.
    #[must_use]
    pub fn admission_stats(&self, kind: ChannelKind) -> AdmissionStats {
        self.channels.get(&kind).map_or(
            AdmissionStats {
                kept: 0,
                cached: 0,
                queued: 0,
                active_limit: self.config.channel_config(kind).active_limit,
            },
            ChannelAdmission::stats,
        )
    }

    /// Number of subscriptions currently known to the engine.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subs.len()
    }

    /// Number of requests queued or awaiting a response on the wire.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.wire.queued_len() + self.wire.in_flight_len()
    }

    /// Whether the publisher connection is currently considered up.
    #[must_use]
    pub fn is_publisher_online(&self) -> bool {
        self.publisher_online
    }

    /// Returns the engine's configuration.
    #[must_use]
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    fn channel_mut(&mut self, kind: ChannelKind) -> &mut ChannelAdmission {
        let config = self.config.channel_config(kind).clone();
        self.channels
            .entry(kind)
            .or_insert_with(|| ChannelAdmission::new(kind, &config))
    }

    fn route_admission(&mut self, changes: Vec<AdmissionChange>) {
        for change in changes {
            match change {
                AdmissionChange::Activated(id) => {
                    let directive = match self.subs.get_mut(&id) {
                        Some(sub) => {
                            self.outbox.open(id);
                            let directive = ProtocolCtx {
                                outbox: &mut self.outbox,
                                retry: &self.retry,
                                publisher_online: self.publisher_online,
                                now: self.now,
                            }
                            .grant_activation(sub);
                            self.outbox.close(id);
                            directive
                        }
                        None => None,
                    };
                    if let Some(directive) = directive {
                        self.apply_directive(id, directive);
                    }
                }
                AdmissionChange::Queued(id, position) => {
                    if let Some(sub) = self.subs.get_mut(&id) {
                        self.outbox.open(id);
                        ProtocolCtx {
                            outbox: &mut self.outbox,
                            retry: &self.retry,
                            publisher_online: self.publisher_online,
                            now: self.now,
                        }
                        .park_queued(sub, position);
                        self.outbox.close(id);
                    }
                }
                AdmissionChange::Cached(id) => {
                    if let Some(sub) = self.subs.get_mut(&id) {
                        sub.admission = AdmissionState::Cached;
                        debug!(subscription = %id, "subscription parked in deactivation cache");
                    }
                }
                AdmissionChange::Deactivated(id) => self.unwind_deactivated(id),
            }
        }
    }

    fn unwind_deactivated(&mut self, id: SubscriptionId) {
        let directive = match self.subs.get_mut(&id) {
            Some(sub) => {
                self.outbox.open(id);
                let directive = ProtocolCtx {
                    outbox: &mut self.outbox,
                    retry: &self.retry,
                    publisher_online: self.publisher_online,
                    now: self.now,
                }
                .deactivate(sub);
                if directive.is_some() {
                    sub.pending_destroy = true;
                }
                self.outbox.close(id);
                directive
            }
            None => return,
        };
        match directive {
            Some(directive) => self.apply_directive(id, directive),
            None => self.destroy(id),
        }
    }

    /// Resolves an owed unsubscribe after the in-flight exchange ended.
    fn resolve_owed(&mut self, id: SubscriptionId, synchronised: bool) {
        let Some(sub) = self.subs.get_mut(&id) else {
            return;
        };
        sub.unsubscribe_owed = false;
        if synchronised {
            sub.protocol = ProtocolState::UnsubscribedSynchronised;
        }
        let registered = sub.registered;
        let kind = sub.definition().channel();
        sub.admission = AdmissionState::NotActive;
        let changes = self.channel_mut(kind).release_slot(id);
        self.route_admission(changes);

        if registered {
            if let Some(sub) = self.subs.get_mut(&id) {
                sub.registered = false;
                sub.pending_destroy = true;
            }
            self.apply_directive(id, WireDirective::SendUnsubscribe);
        } else {
            self.destroy(id);
        }
    }

    fn release_if_terminal(&mut self, id: SubscriptionId) {
        let kind = match self.subs.get_mut(&id) {
            Some(sub) if sub.protocol().is_terminal() => {
                sub.admission = AdmissionState::NotActive;
                sub.definition().channel()
            }
            _ => return,
        };
        let changes = self.channel_mut(kind).release_slot(id);
        self.route_admission(changes);
    }

    fn apply_directive(&mut self, id: SubscriptionId, directive: WireDirective) {
        let Some(sub) = self.subs.get(&id) else {
            return;
        };
        let request = match directive {
            WireDirective::SendActivate => {
                OutboundRequest::activate(id, sub.request_nr, sub.definition().clone())
            }
            WireDirective::SendUnsubscribe => OutboundRequest::unsubscribe(id, sub.request_nr),
        };
        self.wire.enqueue(request, self.now);
    }

    fn destroy(&mut self, id: SubscriptionId) {
        let Some(sub) = self.subs.remove(&id) else {
            return;
        };
        if let Some(key) = sub.definition().key() {
            if self.by_key.get(&key) == Some(&id) {
                self.by_key.remove(&key);
            }
        }
        self.observers.drop_subscription(id);
        self.wire.forget(id);
        info!(subscription = %id, definition = %sub.definition(), "subscription destroyed");
        let kind = sub.definition().channel();
        let changes = self.channel_mut(kind).release_slot(id);
        self.route_admission(changes);
    }

    /// Marks every subscription internally failed and resets all engine
    /// state after an unrecoverable wire failure.
    fn purge_all(&mut self, detail: &str) {
        error!(detail, "purging all subscriptions after wire failure");
        self.wire.clear();
        self.deferred.clear();
        self.channels = Self::build_channels(&self.config);
        let ids: Vec<SubscriptionId> = self.subs.keys().copied().collect();
        for id in ids {
            if let Some(sub) = self.subs.get_mut(&id) {
                self.outbox.open(id);
                sub.admission = AdmissionState::NotActive;
                sub.unsubscribe_owed = false;
                sub.pending_destroy = false;
                ProtocolCtx {
                    outbox: &mut self.outbox,
                    retry: &self.retry,
                    publisher_online: self.publisher_online,
                    now: self.now,
                }
                .purge(sub, detail);
                self.outbox.close(id);
            }
        }
        // Subscriptions nobody holds any more (cached, or mid-unwind) have
        // no path back after a purge; drop them with the wire state.
        let orphans: Vec<SubscriptionId> = self
            .subs
            .iter()
            .filter(|(_, sub)| sub.subscriber_count == 0)
            .map(|(id, _)| *id)
            .collect();
        for id in orphans {
            self.destroy(id);
        }
    }

    fn begin_scope(&mut self) {
        self.update_depth += 1;
    }

    fn end_scope(&mut self) {
        debug_assert!(self.update_depth > 0, "unbalanced update scope");
        self.update_depth = self.update_depth.saturating_sub(1);
        if self.update_depth == 0 {
            self.dispatch_notices();
        }
    }

    /// Drains the outbox to the observers.
    ///
    /// Runs only at the close of the outermost update scope and never
    /// reentrantly: a handler that mutates the engine queues further
    /// notices, and this loop picks them up. Health notices whose epoch was
    /// superseded before dispatch are skipped, so observers only ever see
    /// the latest health.
    fn dispatch_notices(&mut self) {
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while let Some(queued) = self.outbox.pop() {
            if let Some(guard) = queued.guard {
                let current = self
                    .subs
                    .get(&queued.subscription)
                    .map(|sub| sub.health_epoch);
                if current != Some(guard) {
                    continue;
                }
            }
            for handler in self.observers.snapshot(queued.subscription) {
                (handler.lock())(self, &queued.notice);
            }
        }
        self.dispatching = false;
    }
}

impl<T: RequestTransport> std::fmt::Debug for FeedEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedEngine")
            .field("subscriptions", &self.subs.len())
            .field("publisher_online", &self.publisher_online)
            .field("pending_requests", &self.pending_requests())
            .finish_non_exhaustive()
    }
}
