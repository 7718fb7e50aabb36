//! NewType wrappers for feed-engine primitives.
//!
//! This module provides type-safe wrappers around raw integers, strings and
//! decimal values so that incompatible identifiers and time axes cannot be
//! mixed at compile time.
//!
//! # Types
//!
//! - [`SubscriptionId`] - Engine-assigned subscription identities
//! - [`RequestNr`] - Per-subscription request sequence numbers
//! - [`MonoTime`] - Monotonic engine clock (millisecond resolution)
//! - [`Timestamp`] - Wall-clock Unix millisecond timestamps
//! - [`Symbol`] - Instrument identifiers
//! - [`Price`] - Price values carried in decoded payloads
//! - [`Qty`] - Quantity values carried in decoded payloads

mod mono_time;
mod price;
mod quantity;
mod request_nr;
mod subscription_id;
mod symbol;
mod timestamp;

pub use mono_time::MonoTime;
pub use price::Price;
pub use quantity::Qty;
pub use request_nr::RequestNr;
pub use subscription_id::SubscriptionId;
pub use symbol::Symbol;
pub use timestamp::Timestamp;

/// Validation error for `NewType` construction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, thiserror::Error)]
pub enum ValidationError {
    /// Symbol is empty
    #[error("symbol cannot be empty")]
    EmptySymbol,

    /// Symbol format is invalid
    #[error("invalid symbol format: {0}")]
    InvalidSymbol(String),

    /// Symbol exceeds the maximum supported length
    #[error("symbol too long ({0} chars, max {1})")]
    SymbolTooLong(usize, usize),

    /// Price value is negative
    #[error("price cannot be negative: {0}")]
    NegativePrice(rust_decimal::Decimal),

    /// Quantity value is not positive
    #[error("quantity must be positive: {0}")]
    NonPositiveQty(rust_decimal::Decimal),

    /// Timestamp is negative
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}
