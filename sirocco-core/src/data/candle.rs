//! Candle records.

use super::PayloadError;
use crate::definition::CandleInterval;
use crate::types::{Price, Qty, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// One OHLCV candle.
///
/// `open_time` marks the start of the candle's interval; the close time is
/// derived from the interval, not carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleBar {
    /// Instrument the candle aggregates.
    pub symbol: Symbol,
    /// Aggregation period.
    pub interval: CandleInterval,
    /// Start of the candle's interval.
    pub open_time: Timestamp,
    /// Opening price.
    pub open: Price,
    /// Highest price.
    pub high: Price,
    /// Lowest price.
    pub low: Price,
    /// Closing price (last trade so far for a live candle).
    pub close: Price,
    /// Traded volume within the interval.
    pub volume: Qty,
}

impl CandleBar {
    /// Checks the OHLC price relationships.
    ///
    /// # Errors
    ///
    /// Returns an error when `high` is below `low`, or when `open`/`close`
    /// fall outside the `[low, high]` range.
    pub fn validate(&self) -> Result<(), PayloadError> {
        let (high, low) = (self.high.as_decimal(), self.low.as_decimal());
        if high < low {
            return Err(PayloadError::InvalidPriceRelation(format!(
                "high {high} below low {low}"
            )));
        }
        for (name, value) in [("open", self.open.as_decimal()), ("close", self.close.as_decimal())]
        {
            if value < low || value > high {
                return Err(PayloadError::InvalidPriceRelation(format!(
                    "{name} {value} outside [{low}, {high}]"
                )));
            }
        }
        Ok(())
    }

    /// Returns true for a candle that closed higher than it opened.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close.as_decimal() > self.open.as_decimal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> CandleBar {
        CandleBar {
            symbol: Symbol::new_unchecked("BTC-USDT"),
            interval: CandleInterval::M1,
            open_time: Timestamp::new_unchecked(1_704_067_200_000),
            open: Price::new_unchecked(open),
            high: Price::new_unchecked(high),
            low: Price::new_unchecked(low),
            close: Price::new_unchecked(close),
            volume: Qty::new_unchecked(dec!(10)),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(bar(dec!(100), dec!(110), dec!(95), dec!(105)).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let result = bar(dec!(100), dec!(90), dec!(110), dec!(100)).validate();
        assert!(matches!(result, Err(PayloadError::InvalidPriceRelation(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_close() {
        let result = bar(dec!(100), dec!(110), dec!(95), dec!(120)).validate();
        assert!(matches!(result, Err(PayloadError::InvalidPriceRelation(_))));
    }

    #[test]
    fn test_bullish() {
        assert!(bar(dec!(100), dec!(110), dec!(95), dec!(105)).is_bullish());
        assert!(!bar(dec!(105), dec!(110), dec!(95), dec!(100)).is_bullish());
    }
}
