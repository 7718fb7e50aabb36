//! # Sirocco Core
//!
//! Core types for the Sirocco market-data subscription engine.
//!
//! This crate provides:
//! - `NewType` wrappers for feed primitives (`SubscriptionId`, `RequestNr`, `MonoTime`, ...)
//! - The subscription health model (`Badness`, `Correctness`)
//! - Feed definitions with stable deduplication keys (`DataDefinition`, `FeedKey`)
//! - The wire boundary (`PublisherMessage`, `OutboundRequest`)
//! - Decoded payload records (`TradePrint`, `QuoteTick`, `CandleBar`, `DepthUpdate`)
//! - Error types and handling framework
//! - Configuration management with YAML/TOML support and environment variable overrides

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]

/// Core type definitions and 'NewType' wrappers
pub mod types;

/// Subscription health model
pub mod health;

/// Feed definitions and deduplication keys
pub mod definition;

/// Wire boundary messages
pub mod message;

/// Decoded payload records
pub mod data;

/// Error types and handling
pub mod error;

/// Configuration management
pub mod config;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::data::*;
    pub use crate::definition::*;
    pub use crate::error::{ErrorSeverity, SiroccoError, WireError};
    pub use crate::health::*;
    pub use crate::message::*;
    pub use crate::types::*;
}
