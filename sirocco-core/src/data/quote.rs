//! Quote tick records.

use crate::types::{Price, Qty, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Best bid/ask update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTick {
    /// Quoted instrument.
    pub symbol: Symbol,
    /// Quote time (publisher clock).
    pub timestamp: Timestamp,
    /// Best bid price.
    pub bid: Price,
    /// Quantity at the best bid.
    pub bid_qty: Qty,
    /// Best ask price.
    pub ask: Price,
    /// Quantity at the best ask.
    pub ask_qty: Qty,
}

impl QuoteTick {
    /// Creates a quote tick.
    #[must_use]
    pub const fn new(
        symbol: Symbol,
        timestamp: Timestamp,
        bid: Price,
        bid_qty: Qty,
        ask: Price,
        ask_qty: Qty,
    ) -> Self {
        Self {
            symbol,
            timestamp,
            bid,
            bid_qty,
            ask,
            ask_qty,
        }
    }

    /// Returns ask minus bid.
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.ask.as_decimal() - self.bid.as_decimal()
    }

    /// Returns the midpoint of bid and ask.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid.as_decimal() + self.ask.as_decimal()) / Decimal::from(2)
    }

    /// Returns true when the quote is crossed (bid at or above ask).
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        self.bid.as_decimal() >= self.ask.as_decimal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(bid: Decimal, ask: Decimal) -> QuoteTick {
        QuoteTick::new(
            Symbol::new_unchecked("BTC-USDT"),
            Timestamp::new_unchecked(1_704_067_200_000),
            Price::new_unchecked(bid),
            Qty::new_unchecked(dec!(1)),
            Price::new_unchecked(ask),
            Qty::new_unchecked(dec!(1)),
        )
    }

    #[test]
    fn test_spread_and_mid() {
        let q = quote(dec!(41999), dec!(42001));
        assert_eq!(q.spread(), dec!(2));
        assert_eq!(q.mid(), dec!(42000));
    }

    #[test]
    fn test_crossed() {
        assert!(!quote(dec!(41999), dec!(42001)).is_crossed());
        assert!(quote(dec!(42001), dec!(41999)).is_crossed());
    }
}
