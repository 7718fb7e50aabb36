//! Monotonic engine clock value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;
use std::time::Duration;

/// A point on the engine's monotonic clock, in milliseconds.
///
/// The host supplies these values through `tick(now)`; the engine never reads
/// the system clock itself. Keeping the clock injectable makes every timeout
/// and cache-expiry path deterministic under test. `MonoTime` is ordered and
/// supports duration arithmetic but has no defined relation to wall time;
/// use [`super::Timestamp`] for exchange-reported event times.
///
/// # Examples
///
/// ```
/// use sirocco_core::types::MonoTime;
/// use std::time::Duration;
///
/// let start = MonoTime::from_millis(1_000);
/// let deadline = start.saturating_add(Duration::from_secs(2));
/// assert!(deadline > start);
/// assert_eq!(deadline.millis_since(start), 2_000);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MonoTime(u64);

impl MonoTime {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// Creates a clock value from raw milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Adds a duration, saturating at the numeric range end.
    #[must_use]
    pub fn saturating_add(&self, d: Duration) -> Self {
        Self(self.0.saturating_add(duration_millis(d)))
    }

    /// Milliseconds elapsed since `earlier`, or zero when `earlier` is later.
    #[must_use]
    pub const fn millis_since(&self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns true when this point lies at or past `deadline`.
    #[must_use]
    pub const fn has_reached(&self, deadline: Self) -> bool {
        self.0 >= deadline.0
    }
}

impl Sub for MonoTime {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for MonoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_add() {
        let t = MonoTime::from_millis(100);
        assert_eq!(
            t.saturating_add(Duration::from_millis(50)),
            MonoTime::from_millis(150)
        );
        assert_eq!(
            MonoTime::from_millis(u64::MAX).saturating_add(Duration::from_secs(1)),
            MonoTime::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_millis_since_is_saturating() {
        let early = MonoTime::from_millis(10);
        let late = MonoTime::from_millis(60);
        assert_eq!(late.millis_since(early), 50);
        assert_eq!(early.millis_since(late), 0);
    }

    #[test]
    fn test_has_reached() {
        let deadline = MonoTime::from_millis(500);
        assert!(!MonoTime::from_millis(499).has_reached(deadline));
        assert!(MonoTime::from_millis(500).has_reached(deadline));
        assert!(MonoTime::from_millis(501).has_reached(deadline));
    }

    #[test]
    fn test_sub_yields_duration() {
        let a = MonoTime::from_millis(1_500);
        let b = MonoTime::from_millis(1_000);
        assert_eq!(a - b, Duration::from_millis(500));
    }
}
