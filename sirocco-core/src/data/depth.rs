//! Order-book depth records.

use super::PayloadError;
use crate::types::{Price, Qty, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// One price level of a book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    /// Price at this level.
    pub price: Price,
    /// Resting quantity at this level.
    pub quantity: Qty,
}

impl BookLevel {
    /// Creates a book level.
    #[must_use]
    pub const fn new(price: Price, quantity: Qty) -> Self {
        Self { price, quantity }
    }
}

/// Depth snapshot limited to the subscribed level count.
///
/// Bids are sorted best-first (descending), asks best-first (ascending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthUpdate {
    /// Instrument.
    pub symbol: Symbol,
    /// Snapshot time (publisher clock).
    pub timestamp: Timestamp,
    /// Bid side, best first.
    pub bids: Vec<BookLevel>,
    /// Ask side, best first.
    pub asks: Vec<BookLevel>,
}

impl DepthUpdate {
    /// Checks that the snapshot is non-empty and not crossed.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::EmptyBook`] when both sides are empty, or an
    /// `InvalidPriceRelation` when the best bid is at or above the best ask.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.bids.is_empty() && self.asks.is_empty() {
            return Err(PayloadError::EmptyBook);
        }
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid.price.as_decimal() >= ask.price.as_decimal() {
                return Err(PayloadError::InvalidPriceRelation(format!(
                    "crossed book: bid {} >= ask {}",
                    bid.price, ask.price
                )));
            }
        }
        Ok(())
    }

    /// Returns the best bid level, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    /// Returns the best ask level, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }
}
