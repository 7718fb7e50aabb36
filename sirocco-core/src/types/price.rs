//! Price type for decoded payload fields.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A non-negative price carried on a decoded payload record.
///
/// The engine itself never computes with prices; the newtype exists so that
/// payload fields cannot be confused with quantities at the consumer
/// boundary.
///
/// # Examples
///
/// ```
/// use sirocco_core::types::Price;
/// use rust_decimal::Decimal;
///
/// let price = Price::new(Decimal::new(425015, 1)).unwrap();
/// assert_eq!(price.to_string(), "42501.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Creates a price, rejecting negative values.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NegativePrice` if the value is negative.
    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ValidationError::NegativePrice(value));
        }
        Ok(Self(value))
    }

    /// Creates a price without validation.
    ///
    /// # Safety
    ///
    /// The caller must ensure the value is non-negative.
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

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejects_negative() {
        assert!(Price::new(dec!(-0.01)).is_err());
        assert!(Price::new(dec!(0)).is_ok());
        assert!(Price::new(dec!(42000.5)).is_ok());
    }

    #[test]
    fn test_serde_transparent() {
        let price = Price::new(dec!(101.25)).unwrap();
        let json = serde_json::to_string(&price).unwrap();
        let parsed: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, parsed);
    }
}
