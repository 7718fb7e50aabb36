//! Decoded feed payload records.
//!
//! These are the already-decoded records a publisher connection delivers for
//! an active subscription. The engine routes them to subscribers untouched;
//! merging them into books or series is the consumer's concern.
//!
//! # Structures
//!
//! - `TradePrint` - One executed trade
//! - `QuoteTick` - Best bid/ask update
//! - `CandleBar` - One OHLCV candle
//! - `DepthUpdate` - Order-book depth snapshot
//! - `FeedPayload` - Union over the four record kinds

mod candle;
mod depth;
mod quote;
mod trade;

pub use candle::CandleBar;
pub use depth::{BookLevel, DepthUpdate};
pub use quote::QuoteTick;
pub use trade::TradePrint;

use crate::definition::ChannelKind;
use serde::{Deserialize, Serialize};

/// Validation error for payload records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Invalid price relationship (high < low, crossed book, ...)
    #[error("invalid price relationship: {0}")]
    InvalidPriceRelation(String),

    /// Both book sides empty
    #[error("depth update cannot be empty on both sides")]
    EmptyBook,
}

/// One decoded record of any channel kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPayload {
    /// A trade print.
    Trade(TradePrint),
    /// A quote update.
    Quote(QuoteTick),
    /// A candle.
    Candle(CandleBar),
    /// A depth snapshot.
    Depth(DepthUpdate),
}

impl FeedPayload {
    /// Returns the channel kind this record belongs to.
    #[must_use]
    pub const fn channel(&self) -> ChannelKind {
        match self {
            Self::Trade(_) => ChannelKind::Trades,
            Self::Quote(_) => ChannelKind::Quotes,
            Self::Candle(_) => ChannelKind::Candles,
            Self::Depth(_) => ChannelKind::Depth,
        }
    }
}
