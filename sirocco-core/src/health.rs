//! Subscription health model.
//!
//! Health is reported everywhere in the engine as a [`Badness`] value: a
//! reason drawn from a closed enumeration plus a free-form detail string.
//! Each reason maps deterministically to a [`Correctness`] level, and the
//! level collapses to a single usable/unusable boolean for consumers that
//! only care about that. Change detection throughout the engine compares
//! reasons, never detail strings: two `Badness` values with the same reason
//! are the same health state even if their details differ.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a subscription's data is currently not (fully) trustworthy.
///
/// This enumeration is closed: every protocol and admission state the engine
/// can put a subscription into maps to exactly one reason, and
/// [`BadReason::Good`] is the only reason with no accompanying detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadReason {
    /// Data is synchronised with the publisher and trustworthy.
    Good,
    /// The subscription was created but activation has not begun.
    NotSubscribed,
    /// Waiting in the channel's want list for an activation slot.
    QueuedForSlot,
    /// Waiting for the publisher connection to come up.
    WaitingForPublisher,
    /// The publisher connection dropped; data is stale.
    PublisherOffline,
    /// The publisher declined the subscription until its capability improves.
    WaitingForCapability,
    /// A retryable failure occurred; re-activation is scheduled.
    RetryPending,
    /// An activation request is in flight, awaiting the first response.
    AwaitingResponse,
    /// The first response arrived; the initial image is still streaming in.
    Synchronising,
    /// The publisher reported a terminal subscription error.
    FeedFault,
    /// The engine hit an invariant violation and purged this subscription.
    Internal,
}

impl BadReason {
    /// Maps this reason to its correctness level.
    #[must_use]
    pub const fn correctness(&self) -> Correctness {
        match self {
            Self::Good => Correctness::Good,
            Self::RetryPending => Correctness::Suspect,
            Self::FeedFault | Self::Internal => Correctness::Error,
            Self::NotSubscribed
            | Self::QueuedForSlot
            | Self::WaitingForPublisher
            | Self::PublisherOffline
            | Self::WaitingForCapability
            | Self::AwaitingResponse
            | Self::Synchronising => Correctness::Unusable,
        }
    }

    /// Returns the reason as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::NotSubscribed => "not_subscribed",
            Self::QueuedForSlot => "queued_for_slot",
            Self::WaitingForPublisher => "waiting_for_publisher",
            Self::PublisherOffline => "publisher_offline",
            Self::WaitingForCapability => "waiting_for_capability",
            Self::RetryPending => "retry_pending",
            Self::AwaitingResponse => "awaiting_response",
            Self::Synchronising => "synchronising",
            Self::FeedFault => "feed_fault",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for BadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How usable a subscription's data currently is.
///
/// The order is total and runs from best to worst, so `min`/`max` can be
/// used to combine the correctness of several sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    /// Fully synchronised and trustworthy.
    Good,
    /// Usable, but a recovery is under way; treat values with caution.
    Suspect,
    /// Not usable right now; recovery is expected.
    Unusable,
    /// Terminally failed; no recovery without a new subscription.
    Error,
}

impl Correctness {
    /// Returns true if data at this level may still be shown to a consumer.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Good | Self::Suspect)
    }

    /// Returns true for the terminal error level.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for Correctness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Good => "good",
            Self::Suspect => "suspect",
            Self::Unusable => "unusable",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Structured health value: a closed reason plus free-form detail.
///
/// # Examples
///
/// ```
/// use sirocco_core::health::{BadReason, Badness};
///
/// let good = Badness::good();
/// assert!(good.is_usable());
/// assert!(good.detail().is_empty());
///
/// let queued = Badness::new(BadReason::QueuedForSlot, "2 ahead in want list");
/// assert!(!queued.is_usable());
/// assert!(queued.differs_from(&good));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badness {
    reason: BadReason,
    detail: String,
}

impl Badness {
    /// The unique healthy value; its detail is always empty.
    #[must_use]
    pub fn good() -> Self {
        Self {
            reason: BadReason::Good,
            detail: String::new(),
        }
    }

    /// Creates a badness value for a non-good reason.
    ///
    /// Passing [`BadReason::Good`] discards the detail, preserving the
    /// invariant that the good value carries none.
    #[must_use]
    pub fn new(reason: BadReason, detail: impl Into<String>) -> Self {
        if matches!(reason, BadReason::Good) {
            return Self::good();
        }
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// Returns the reason kind.
    #[must_use]
    pub const fn reason(&self) -> BadReason {
        self.reason
    }

    /// Returns the human-readable detail (empty for the good value).
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns the correctness level derived from the reason.
    #[must_use]
    pub const fn correctness(&self) -> Correctness {
        self.reason.correctness()
    }

    /// Collapses to the single usable/unusable boolean.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.correctness().is_usable()
    }

    /// Returns true when the two values differ **by reason**.
    ///
    /// Detail strings are deliberately ignored; the engine fires change
    /// notifications only on reason transitions.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.reason != other.reason
    }
}

impl fmt::Display for Badness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.reason, self.detail)
        }
    }
}

impl Default for Badness {
    fn default() -> Self {
        Self::good()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_good_is_unique_and_empty() {
        let good = Badness::good();
        assert_eq!(good.reason(), BadReason::Good);
        assert!(good.detail().is_empty());

        // Constructing "good with detail" must drop the detail.
        let forced = Badness::new(BadReason::Good, "leftover");
        assert_eq!(forced, good);
    }

    #[test]
    fn test_correctness_mapping_is_total() {
        let cases = [
            (BadReason::Good, Correctness::Good),
            (BadReason::NotSubscribed, Correctness::Unusable),
            (BadReason::QueuedForSlot, Correctness::Unusable),
            (BadReason::WaitingForPublisher, Correctness::Unusable),
            (BadReason::PublisherOffline, Correctness::Unusable),
            (BadReason::WaitingForCapability, Correctness::Unusable),
            (BadReason::RetryPending, Correctness::Suspect),
            (BadReason::AwaitingResponse, Correctness::Unusable),
            (BadReason::Synchronising, Correctness::Unusable),
            (BadReason::FeedFault, Correctness::Error),
            (BadReason::Internal, Correctness::Error),
        ];
        for (reason, expected) in cases {
            assert_eq!(reason.correctness(), expected, "reason {reason}");
        }
    }

    #[test]
    fn test_correctness_order() {
        assert!(Correctness::Good < Correctness::Suspect);
        assert!(Correctness::Suspect < Correctness::Unusable);
        assert!(Correctness::Unusable < Correctness::Error);
    }

    #[test]
    fn test_usable_collapse() {
        assert!(Badness::good().is_usable());
        assert!(Badness::new(BadReason::RetryPending, "attempt 2").is_usable());
        assert!(!Badness::new(BadReason::QueuedForSlot, "").is_usable());
        assert!(!Badness::new(BadReason::FeedFault, "rejected").is_usable());
    }

    #[test]
    fn test_comparison_ignores_detail() {
        let a = Badness::new(BadReason::RetryPending, "attempt 1");
        let b = Badness::new(BadReason::RetryPending, "attempt 2");
        assert!(!a.differs_from(&b));

        let c = Badness::new(BadReason::FeedFault, "attempt 1");
        assert!(a.differs_from(&c));
    }

    #[test]
    fn test_display() {
        assert_eq!(Badness::good().to_string(), "good");
        assert_eq!(
            Badness::new(BadReason::QueuedForSlot, "3 ahead").to_string(),
            "queued_for_slot: 3 ahead"
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let badness = Badness::new(BadReason::WaitingForCapability, "market closed");
        let json = serde_json::to_string(&badness).unwrap();
        let parsed: Badness = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, badness);
    }
}
