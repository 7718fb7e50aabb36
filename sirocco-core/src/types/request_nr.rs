//! Per-subscription request sequence number.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strictly increasing request number scoped to one subscription.
///
/// Every outbound activation carries the subscription's current number, and
/// an inbound response is honoured only when its echoed number matches. The
/// number advances on every (re)activation, so a response belonging to a
/// superseded activation can always be recognised and discarded.
///
/// # Examples
///
/// ```
/// use sirocco_core::types::RequestNr;
///
/// let first = RequestNr::ZERO.next();
/// let second = first.next();
/// assert!(second > first);
/// assert_ne!(first, second);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestNr(u64);

impl RequestNr {
    /// The number no request has carried yet.
    pub const ZERO: Self = Self(0);

    /// Creates a request number from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the next request number in sequence.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RequestNr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_strictly_increases() {
        let mut nr = RequestNr::ZERO;
        for _ in 0..5 {
            let advanced = nr.next();
            assert!(advanced > nr);
            nr = advanced;
        }
        assert_eq!(nr.as_u64(), 5);
    }

    #[test]
    fn test_display() {
        assert_eq!(RequestNr::new(3).to_string(), "#3");
    }
}
