//! Quantity type for decoded payload fields.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A strictly positive size carried on a decoded payload record.
///
/// Publishers report trade and book sizes as positive numbers; a zero size on
/// a depth level is expressed by removing the level, not by a zero `Qty`.
///
/// # Examples
///
/// ```
/// use sirocco_core::types::Qty;
/// use rust_decimal::Decimal;
///
/// let qty = Qty::new(Decimal::new(15, 1)).unwrap();
/// assert_eq!(qty.to_string(), "1.5");
/// assert!(Qty::new(Decimal::ZERO).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Qty(Decimal);

impl Qty {
    /// Creates a quantity, rejecting zero and negative values.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NonPositiveQty` if the value is not positive.
    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value.is_zero() || value.is_sign_negative() {
            return Err(ValidationError::NonPositiveQty(value));
        }
        Ok(Self(value))
    }

    /// Creates a quantity without validation.
    ///
    /// # Safety
    ///
    /// The caller must ensure the value is strictly positive.
    #[must_use]
    pub const fn new_unchecked(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the inner decimal.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
