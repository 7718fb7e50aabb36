//! Request scheduling and response timeout tracking for one publisher
//! connection.
//!
//! The [`WireManager`] owns two send queues: a high-priority queue that is
//! never throttled (unsubscribes and control-plane activations) and a normal
//! queue that sends at most a configured number of requests per fixed
//! window, or nothing at all while a batching bracket is open. Activations
//! that leave the wire are tracked on a deadline-ordered wait list; the
//! engine's tick pops every expired entry and drives it through the retry
//! rules.
//!
//! The physical transport is behind the [`RequestTransport`] trait so the
//! engine can run against a tokio channel bridge, a real codec, or a
//! recording double in tests. A transport failure is not absorbed here: it
//! propagates to the engine, which purges all subscriptions rather than
//! continue from a half-sent state.

use sirocco_core::prelude::{
    MonoTime, OutboundRequest, RequestNr, RequestPriority, SubscriptionId, ThrottleConfig,
    WireConfig, WireError,
};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Physical delivery of encoded requests; implemented by the host.
pub trait RequestTransport {
    /// Hands one request to the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] when the request cannot be delivered. The
    /// engine treats this as unrecoverable for the session and purges all
    /// subscriptions.
    fn send(&mut self, request: &OutboundRequest) -> Result<(), WireError>;
}

/// A queued request with the time it entered the queue.
#[derive(Debug, Clone)]
struct Pending {
    request: OutboundRequest,
    enqueued_at: MonoTime,
}

/// An activation waiting for its first response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub(crate) subscription: SubscriptionId,
    pub(crate) request_nr: RequestNr,
    pub(crate) deadline: MonoTime,
}

/// Outbound scheduler and response-deadline tracker for one connection.
#[derive(Debug)]
pub struct WireManager<T> {
    transport: T,
    response_timeout: Duration,
    throttle: ThrottleConfig,
    high: VecDeque<Pending>,
    normal: VecDeque<Pending>,
    /// Appended in send order with a constant timeout, so the front entry
    /// always has the earliest deadline.
    in_flight: VecDeque<InFlight>,
    window_start: MonoTime,
    sent_in_window: u32,
    batch_depth: u32,
}

impl<T: RequestTransport> WireManager<T> {
    /// Creates a manager over a transport with the given wire settings.
    #[must_use]
    pub fn new(transport: T, config: &WireConfig) -> Self {
        Self {
            transport,
            response_timeout: config.response_timeout,
            throttle: config.throttle.clone(),
            high: VecDeque::new(),
            normal: VecDeque::new(),
            in_flight: VecDeque::new(),
            window_start: MonoTime::ZERO,
            sent_in_window: 0,
            batch_depth: 0,
        }
    }

    /// Queues a request on the queue its priority selects.
    ///
    /// Any earlier request for the same subscription, queued or in flight,
    /// is dropped first: a subscription has at most one active wire request
    /// at any time, and the newer request supersedes it.
    pub fn enqueue(&mut self, request: OutboundRequest, now: MonoTime) {
        self.forget(request.subscription);
        trace!(
            subscription = %request.subscription,
            kind = %request.kind,
            priority = %request.priority,
            "request queued"
        );
        let pending = Pending {
            request,
            enqueued_at: now,
        };
        match pending.request.priority {
            RequestPriority::High => self.high.push_back(pending),
            RequestPriority::Normal => self.normal.push_back(pending),
        }
    }

    /// Drops every queued or in-flight request for a subscription.
    pub fn forget(&mut self, subscription: SubscriptionId) {
        self.high.retain(|p| p.request.subscription != subscription);
        self.normal.retain(|p| p.request.subscription != subscription);
        self.in_flight.retain(|f| f.subscription != subscription);
    }

    /// Opens a batching bracket: the normal queue is fully suspended until
    /// the outermost bracket closes, so a burst of related requests leaves
    /// the wire together.
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Closes one batching bracket.
    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            warn!("batch bracket closed without open");
            return;
        }
        self.batch_depth -= 1;
    }

    /// Pops every in-flight activation whose response deadline has elapsed.
    ///
    /// The wait list is deadline-ordered, so this scans only the front.
    pub(crate) fn take_expired(&mut self, now: MonoTime) -> Vec<InFlight> {
        let mut expired = Vec::new();
        while let Some(front) = self.in_flight.front() {
            if !now.has_reached(front.deadline) {
                break;
            }
            // Front checked above; pop cannot fail.
            if let Some(entry) = self.in_flight.pop_front() {
                expired.push(entry);
            }
        }
        expired
    }

    /// Sends everything currently allowed to leave.
    ///
    /// The high queue drains completely; the normal queue honours the
    /// throttle window and the batching suspension. Sent activations join
    /// the wait list with `now + response_timeout` as their deadline.
    ///
    /// # Errors
    ///
    /// Returns the transport's error verbatim on the first failed send;
    /// nothing after the failing request is attempted.
    pub fn pump(&mut self, now: MonoTime) -> Result<Vec<OutboundRequest>, WireError> {
        self.roll_window(now);
        let mut sent = Vec::new();

        while let Some(pending) = self.high.pop_front() {
            self.send_one(pending, now, &mut sent)?;
        }

        let mut budget = if self.batch_depth > 0 {
            0
        } else {
            self.throttle.max_per_window.saturating_sub(self.sent_in_window)
        };
        while budget > 0 {
            let Some(pending) = self.normal.pop_front() else {
                break;
            };
            self.send_one(pending, now, &mut sent)?;
            self.sent_in_window += 1;
            budget -= 1;
        }
        Ok(sent)
    }

    fn send_one(
        &mut self,
        pending: Pending,
        now: MonoTime,
        sent: &mut Vec<OutboundRequest>,
    ) -> Result<(), WireError> {
        debug!(
            subscription = %pending.request.subscription,
            kind = %pending.request.kind,
            queued_ms = now.millis_since(pending.enqueued_at),
            "sending request"
        );
        self.transport.send(&pending.request)?;
        if pending.request.is_activate() {
            self.in_flight.push_back(InFlight {
                subscription: pending.request.subscription,
                request_nr: pending.request.request_nr,
                deadline: now.saturating_add(self.response_timeout),
            });
        }
        sent.push(pending.request);
        Ok(())
    }

    fn roll_window(&mut self, now: MonoTime) {
        let window_ms = self.throttle.window.as_millis() as u64;
        if now.millis_since(self.window_start) >= window_ms {
            self.window_start = now;
            self.sent_in_window = 0;
        }
    }

    /// Drops every queued request and every in-flight deadline.
    ///
    /// Used on publisher offline: nothing may remain half-sent.
    pub fn clear(&mut self) {
        self.high.clear();
        self.normal.clear();
        self.in_flight.clear();
    }

    /// Number of requests waiting in the two send queues.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.high.len() + self.normal.len()
    }

    /// Number of activations awaiting a response.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// True when nothing is queued or awaiting a response.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queued_len() == 0 && self.in_flight.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording transport double shared by wire and engine tests.

    use super::{OutboundRequest, RequestTransport, WireError};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every request it is handed; cloning shares the log, so a
    /// test can keep one handle while the engine owns the other.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingTransport {
        log: Arc<Mutex<Vec<OutboundRequest>>>,
        fail_with: Arc<Mutex<Option<WireError>>>,
    }

    impl RecordingTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn sent(&self) -> Vec<OutboundRequest> {
            self.log.lock().clone()
        }

        pub(crate) fn take_sent(&self) -> Vec<OutboundRequest> {
            std::mem::take(&mut *self.log.lock())
        }

        pub(crate) fn fail_next(&self, error: WireError) {
            *self.fail_with.lock() = Some(error);
        }
    }

    impl RequestTransport for RecordingTransport {
        fn send(&mut self, request: &OutboundRequest) -> Result<(), WireError> {
            if let Some(error) = self.fail_with.lock().take() {
                return Err(error);
            }
            self.log.lock().push(request.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;
    use sirocco_core::prelude::{DataDefinition, Symbol};

    fn config(max_per_window: u32, window_ms: u64) -> WireConfig {
        WireConfig {
            response_timeout: Duration::from_millis(2_000),
            throttle: ThrottleConfig {
                window: Duration::from_millis(window_ms),
                max_per_window,
            },
        }
    }

    fn activate(sub: u64, nr: u64) -> OutboundRequest {
        OutboundRequest::activate(
            SubscriptionId::new(sub),
            RequestNr::new(nr),
            DataDefinition::trades(Symbol::new_unchecked("BTC-USDT")),
        )
    }

    fn unsubscribe(sub: u64, nr: u64) -> OutboundRequest {
        OutboundRequest::unsubscribe(SubscriptionId::new(sub), RequestNr::new(nr))
    }

    fn manager(max_per_window: u32) -> (WireManager<RecordingTransport>, RecordingTransport) {
        let transport = RecordingTransport::new();
        let log = transport.clone();
        (WireManager::new(transport, &config(max_per_window, 1_000)), log)
    }

    #[test]
    fn test_throttle_bounds_normal_queue_per_window() {
        let (mut wire, log) = manager(2);
        for n in 1..=5 {
            wire.enqueue(activate(n, 1), MonoTime::ZERO);
        }

        let sent = wire.pump(MonoTime::ZERO).unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(wire.queued_len(), 3);

        // Same window: budget exhausted.
        let sent = wire.pump(MonoTime::from_millis(500)).unwrap();
        assert!(sent.is_empty());

        // Next window: budget renews.
        let sent = wire.pump(MonoTime::from_millis(1_000)).unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(log.sent().len(), 4);
    }

    #[test]
    fn test_high_queue_is_never_throttled() {
        let (mut wire, log) = manager(1);
        wire.enqueue(activate(1, 1), MonoTime::ZERO);
        for n in 2..=4 {
            wire.enqueue(unsubscribe(n, 1), MonoTime::ZERO);
        }

        let sent = wire.pump(MonoTime::ZERO).unwrap();
        // All three unsubscribes plus one throttled activate.
        assert_eq!(sent.len(), 4);
        assert!(log.sent()[..3].iter().all(OutboundRequest::is_unsubscribe));
    }

    #[test]
    fn test_batch_suspends_normal_queue_only() {
        let (mut wire, _log) = manager(10);
        wire.enqueue(activate(1, 1), MonoTime::ZERO);
        wire.enqueue(unsubscribe(2, 1), MonoTime::ZERO);

        wire.begin_batch();
        let sent = wire.pump(MonoTime::ZERO).unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_unsubscribe());

        wire.end_batch();
        let sent = wire.pump(MonoTime::ZERO).unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_activate());
    }

    #[test]
    fn test_nested_batches_release_at_outermost_close() {
        let (mut wire, _log) = manager(10);
        wire.enqueue(activate(1, 1), MonoTime::ZERO);

        wire.begin_batch();
        wire.begin_batch();
        wire.end_batch();
        assert!(wire.pump(MonoTime::ZERO).unwrap().is_empty());
        wire.end_batch();
        assert_eq!(wire.pump(MonoTime::ZERO).unwrap().len(), 1);
    }

    #[test]
    fn test_sent_activation_arms_deadline() {
        let (mut wire, _log) = manager(10);
        wire.enqueue(activate(1, 1), MonoTime::ZERO);
        wire.pump(MonoTime::ZERO).unwrap();
        assert_eq!(wire.in_flight_len(), 1);

        assert!(wire.take_expired(MonoTime::from_millis(1_999)).is_empty());
        let expired = wire.take_expired(MonoTime::from_millis(2_000));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].subscription, SubscriptionId::new(1));
        assert_eq!(expired[0].request_nr, RequestNr::new(1));
        assert_eq!(wire.in_flight_len(), 0);
    }

    #[test]
    fn test_unsubscribe_is_fire_and_forget() {
        let (mut wire, _log) = manager(10);
        wire.enqueue(unsubscribe(1, 1), MonoTime::ZERO);
        wire.pump(MonoTime::ZERO).unwrap();
        assert_eq!(wire.in_flight_len(), 0);
    }

    #[test]
    fn test_enqueue_supersedes_earlier_request() {
        let (mut wire, _log) = manager(10);
        wire.enqueue(activate(1, 1), MonoTime::ZERO);
        wire.pump(MonoTime::ZERO).unwrap();
        assert_eq!(wire.in_flight_len(), 1);

        // A re-activation replaces the in-flight deadline entry.
        wire.enqueue(activate(1, 2), MonoTime::from_millis(100));
        assert_eq!(wire.in_flight_len(), 0);
        assert_eq!(wire.queued_len(), 1);
    }

    #[test]
    fn test_transport_failure_propagates() {
        let (mut wire, log) = manager(10);
        wire.enqueue(activate(1, 1), MonoTime::ZERO);
        log.fail_next(WireError::closed("socket reset"));

        let result = wire.pump(MonoTime::ZERO);
        assert!(matches!(result, Err(WireError::TransportClosed { .. })));
    }

    #[test]
    fn test_clear_leaves_nothing_half_sent() {
        let (mut wire, _log) = manager(1);
        wire.enqueue(activate(1, 1), MonoTime::ZERO);
        wire.enqueue(activate(2, 1), MonoTime::ZERO);
        wire.pump(MonoTime::ZERO).unwrap();
        assert!(!wire.is_idle());

        wire.clear();
        assert!(wire.is_idle());
    }

    #[test]
    fn test_expired_entries_pop_in_deadline_order() {
        let (mut wire, _log) = manager(10);
        wire.enqueue(activate(1, 1), MonoTime::ZERO);
        wire.pump(MonoTime::ZERO).unwrap();
        wire.enqueue(activate(2, 1), MonoTime::from_millis(500));
        wire.pump(MonoTime::from_millis(500)).unwrap();

        let expired = wire.take_expired(MonoTime::from_millis(2_000));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].subscription, SubscriptionId::new(1));

        let expired = wire.take_expired(MonoTime::from_millis(2_500));
        assert_eq!(expired[0].subscription, SubscriptionId::new(2));
    }
}
