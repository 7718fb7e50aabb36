//! Per-subscription notice observer registry.
//!
//! Consumers attach handler closures to a subscription and receive every
//! [`SubscriptionNotice`](crate::events::SubscriptionNotice) the engine
//! publishes for it. The registry hands out opaque [`ObserverToken`]s so a
//! handler can be detached later without exposing registry internals.
//!
//! Dispatch is reentrancy-safe by construction: the engine takes a
//! [`snapshot`](ObserverSet::snapshot) of the handler list before invoking
//! anything, so a handler that attaches or detaches observers mid-dispatch
//! mutates the registry without invalidating the iteration in progress.

use parking_lot::Mutex;
use sirocco_core::prelude::SubscriptionId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Handler invoked with a mutable context (the engine) and the notice.
pub type NoticeHandler<C, A> = dyn FnMut(&mut C, &A) + Send;

/// Shared, lockable handle to a single registered handler.
pub type SharedHandler<C, A> = Arc<Mutex<Box<NoticeHandler<C, A>>>>;

/// Opaque handle identifying one attached handler.
///
/// Returned by [`ObserverSet::attach`]; pass it back to
/// [`ObserverSet::detach`] to remove the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken {
    subscription: SubscriptionId,
    seq: u64,
}

impl ObserverToken {
    /// The subscription this token's handler observes.
    #[must_use]
    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }
}

impl fmt::Display for ObserverToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}-{}", self.subscription, self.seq)
    }
}

/// Registry of notice handlers keyed by subscription.
///
/// `C` is the dispatch context (mutable engine reference) and `A` the notice
/// type; both are generic so the registry can be tested in isolation.
pub struct ObserverSet<C, A> {
    handlers: HashMap<SubscriptionId, Vec<(u64, SharedHandler<C, A>)>>,
    next_seq: u64,
}

impl<C, A> Default for ObserverSet<C, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, A> fmt::Debug for ObserverSet<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("subscriptions", &self.handlers.len())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl<C, A> ObserverSet<C, A> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Attaches a handler to a subscription and returns its token.
    pub fn attach<F>(&mut self, subscription: SubscriptionId, handler: F) -> ObserverToken
    where
        F: FnMut(&mut C, &A) + Send + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.handlers
            .entry(subscription)
            .or_default()
            .push((seq, Arc::new(Mutex::new(Box::new(handler)))));
        trace!(subscription = %subscription, seq = seq, "observer attached");
        ObserverToken { subscription, seq }
    }

    /// Detaches the handler identified by `token`.
    ///
    /// Returns `false` when the token is unknown (already detached, or the
    /// whole subscription was dropped).
    pub fn detach(&mut self, token: &ObserverToken) -> bool {
        let Some(list) = self.handlers.get_mut(&token.subscription) else {
            return false;
        };
        let before = list.len();
        list.retain(|(seq, _)| *seq != token.seq);
        let removed = list.len() < before;
        if list.is_empty() {
            self.handlers.remove(&token.subscription);
        }
        if removed {
            trace!(subscription = %token.subscription, seq = token.seq, "observer detached");
        }
        removed
    }

    /// Clones out the current handler list for a subscription.
    ///
    /// The caller iterates the snapshot while the registry remains free to
    /// mutate, which is what makes reentrant attach/detach safe.
    #[must_use]
    pub fn snapshot(&self, subscription: SubscriptionId) -> Vec<SharedHandler<C, A>> {
        self.handlers
            .get(&subscription)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    /// Removes every handler attached to a subscription.
    pub fn drop_subscription(&mut self, subscription: SubscriptionId) {
        if self.handlers.remove(&subscription).is_some() {
            trace!(subscription = %subscription, "observers dropped with subscription");
        }
    }

    /// Number of handlers attached to a subscription.
    #[must_use]
    pub fn handler_count(&self, subscription: SubscriptionId) -> usize {
        self.handlers.get(&subscription).map_or(0, Vec::len)
    }

    /// True when no handler is attached to any subscription.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Removes every handler for every subscription.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ctx {
        seen: Vec<String>,
    }

    fn sub(n: u64) -> SubscriptionId {
        SubscriptionId::new(n)
    }

    #[test]
    fn test_attach_and_dispatch_via_snapshot() {
        let mut set: ObserverSet<Ctx, String> = ObserverSet::new();
        set.attach(sub(1), |ctx, notice: &String| {
            ctx.seen.push(notice.clone());
        });

        let mut ctx = Ctx { seen: Vec::new() };
        for handler in set.snapshot(sub(1)) {
            (handler.lock())(&mut ctx, &"tick".to_string());
        }
        assert_eq!(ctx.seen, vec!["tick".to_string()]);
    }

    #[test]
    fn test_snapshot_of_unknown_subscription_is_empty() {
        let set: ObserverSet<Ctx, String> = ObserverSet::new();
        assert!(set.snapshot(sub(9)).is_empty());
    }

    #[test]
    fn test_detach_removes_only_the_token_owner() {
        let mut set: ObserverSet<Ctx, String> = ObserverSet::new();
        let token_a = set.attach(sub(1), |_, _| {});
        let _token_b = set.attach(sub(1), |_, _| {});

        assert_eq!(set.handler_count(sub(1)), 2);
        assert!(set.detach(&token_a));
        assert_eq!(set.handler_count(sub(1)), 1);
        assert!(!set.detach(&token_a), "second detach is a no-op");
    }

    #[test]
    fn test_detach_last_handler_removes_entry() {
        let mut set: ObserverSet<Ctx, String> = ObserverSet::new();
        let token = set.attach(sub(1), |_, _| {});
        assert!(set.detach(&token));
        assert!(set.is_empty());
    }

    #[test]
    fn test_drop_subscription_removes_all_handlers() {
        let mut set: ObserverSet<Ctx, String> = ObserverSet::new();
        set.attach(sub(1), |_, _| {});
        set.attach(sub(1), |_, _| {});
        set.attach(sub(2), |_, _| {});

        set.drop_subscription(sub(1));
        assert_eq!(set.handler_count(sub(1)), 0);
        assert_eq!(set.handler_count(sub(2)), 1);
    }

    #[test]
    fn test_tokens_are_unique_across_subscriptions() {
        let mut set: ObserverSet<Ctx, String> = ObserverSet::new();
        let a = set.attach(sub(1), |_, _| {});
        let b = set.attach(sub(2), |_, _| {});
        assert_ne!(a, b);
        assert_eq!(a.subscription(), sub(1));
        assert_eq!(b.subscription(), sub(2));
    }

    #[test]
    fn test_snapshot_tolerates_mutation_between_calls() {
        // A handler that detaches itself must not break iteration of an
        // already-taken snapshot.
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut set: ObserverSet<Ctx, String> = ObserverSet::new();
        set.attach(sub(1), |_, _| {
            CALLS.fetch_add(1, Ordering::SeqCst);
        });
        set.attach(sub(1), |_, _| {
            CALLS.fetch_add(1, Ordering::SeqCst);
        });

        let snapshot = set.snapshot(sub(1));
        set.clear(); // registry mutated after snapshot

        let mut ctx = Ctx { seen: Vec::new() };
        for handler in &snapshot {
            (handler.lock())(&mut ctx, &"x".to_string());
        }
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }
}
