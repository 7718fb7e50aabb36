//! Subscription identity type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-assigned identity of one subscription.
///
/// Ids are handed out from a monotonically increasing counter at subscription
/// creation and are never reused, even after the subscription is destroyed.
/// This makes an id safe to keep in queues and wait lists that may outlive
/// the subscription itself: a lookup simply misses.
///
/// # Examples
///
/// ```
/// use sirocco_core::types::SubscriptionId;
///
/// let id = SubscriptionId::new(7);
/// assert_eq!(id.as_u64(), 7);
/// assert_eq!(id.to_string(), "sub-7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a subscription id from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl From<u64> for SubscriptionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
