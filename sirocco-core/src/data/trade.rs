//! Trade print records.

use crate::types::{Price, Qty, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// One executed trade as reported by the publisher.
///
/// # Examples
///
/// ```
/// use sirocco_core::data::TradePrint;
/// use sirocco_core::types::{Price, Qty, Symbol, Timestamp};
/// use rust_decimal_macros::dec;
///
/// let print = TradePrint::new(
///     Symbol::new("BTC-USDT").unwrap(),
///     Timestamp::new(1_704_067_200_000).unwrap(),
///     Price::new(dec!(42000)).unwrap(),
///     Qty::new(dec!(0.25)).unwrap(),
/// );
/// assert_eq!(print.notional(), dec!(10500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePrint {
    /// Traded instrument.
    pub symbol: Symbol,
    /// Trade time (publisher clock).
    pub timestamp: Timestamp,
    /// Execution price.
    pub price: Price,
    /// Executed quantity.
    pub quantity: Qty,
}

impl TradePrint {
    /// Creates a trade print.
    #[must_use]
    pub const fn new(symbol: Symbol, timestamp: Timestamp, price: Price, quantity: Qty) -> Self {
        Self {
            symbol,
            timestamp,
            price,
            quantity,
        }
    }

    /// Returns price times quantity.
    #[must_use]
    pub fn notional(&self) -> rust_decimal::Decimal {
        self.price.as_decimal() * self.quantity.as_decimal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_notional() {
        let print = TradePrint::new(
            Symbol::new_unchecked("ETH-USDT"),
            Timestamp::new_unchecked(1_704_067_200_000),
            Price::new_unchecked(dec!(2500)),
            Qty::new_unchecked(dec!(2)),
        );
        assert_eq!(print.notional(), dec!(5000));
    }

    #[test]
    fn test_serde_roundtrip() {
        let print = TradePrint::new(
            Symbol::new_unchecked("BTC-USDT"),
            Timestamp::new_unchecked(1_704_067_200_000),
            Price::new_unchecked(dec!(42000)),
            Qty::new_unchecked(dec!(0.5)),
        );
        let json = serde_json::to_string(&print).unwrap();
        let parsed: TradePrint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, print);
    }
}
