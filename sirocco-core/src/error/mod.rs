//! Error types and handling framework.
//!
//! This module provides a hierarchical error type system for the feed
//! engine.
//!
//! # Error Hierarchy
//!
//! - `SiroccoError` - Top-level error type
//!   - `ConfigError` - Configuration loading and validation errors
//!   - `WireError` - Transport send failures
//!   - `ValidationError` - Value construction errors
//!   - `InternalError` - Invariant violations inside the engine
//!
//! Publisher faults, request timeouts and offline transitions are *not*
//! errors at this boundary: the engine absorbs them into subscription
//! badness. Only failures the engine cannot recover from internally cross
//! it as `Result::Err`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error severity levels for categorizing errors.
///
/// # Examples
///
/// ```
/// use sirocco_core::error::ErrorSeverity;
///
/// let severity = ErrorSeverity::Recoverable;
/// assert!(severity.is_recoverable());
/// assert!(!severity.is_fatal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Unrecoverable error requiring immediate attention.
    /// The engine cannot continue normal operation.
    Fatal,

    /// Error that can potentially be recovered from through retry or
    /// rebuild. The operation failed but the engine can continue.
    #[default]
    Recoverable,

    /// Non-critical issue that should be logged but doesn't prevent
    /// operation.
    Warning,

    /// Informational message about an expected or handled condition.
    Info,
}

impl ErrorSeverity {
    /// Returns true if this error is recoverable (not fatal).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }

    /// Returns true if this error is fatal (unrecoverable).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Returns the severity as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Recoverable => "RECOVERABLE",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

mod config;
mod internal;
mod wire;

pub use config::ConfigError;
pub use internal::InternalError;
pub use wire::WireError;

pub use crate::types::ValidationError;

/// Top-level error type for the feed engine.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiroccoError {
    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Transport error.
    #[error("{0}")]
    Wire(#[from] WireError),

    /// Value validation error.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Engine invariant violation.
    #[error("{0}")]
    Internal(#[from] InternalError),
}

impl SiroccoError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config(e) => e.severity(),
            Self::Wire(e) => e.severity(),
            Self::Validation(_) => ErrorSeverity::Warning,
            Self::Internal(e) => e.severity(),
        }
    }

    /// Returns true if this error is recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity().is_recoverable()
    }

    /// Returns the error category as a string.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Wire(_) => "wire",
            Self::Validation(_) => "validation",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns true if this is a wire error.
    #[must_use]
    pub fn is_wire_error(&self) -> bool {
        matches!(self, Self::Wire(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Returns the inner wire error, if this is a wire error.
    #[must_use]
    pub fn as_wire_error(&self) -> Option<&WireError> {
        match self {
            Self::Wire(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the inner internal error, if this is an internal error.
    #[must_use]
    pub fn as_internal_error(&self) -> Option<&InternalError> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// A specialized Result type for feed-engine operations.
pub type Result<T> = std::result::Result<T, SiroccoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubscriptionId;

    #[test]
    fn test_error_severity_display() {
        assert_eq!(ErrorSeverity::Fatal.to_string(), "FATAL");
        assert_eq!(ErrorSeverity::Recoverable.to_string(), "RECOVERABLE");
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARNING");
        assert_eq!(ErrorSeverity::Info.to_string(), "INFO");
    }

    #[test]
    fn test_error_severity_predicates() {
        assert!(!ErrorSeverity::Fatal.is_recoverable());
        assert!(ErrorSeverity::Fatal.is_fatal());
        assert!(ErrorSeverity::Recoverable.is_recoverable());
        assert!(ErrorSeverity::Warning.is_recoverable());
        assert!(ErrorSeverity::Info.is_recoverable());
    }

    #[test]
    fn test_wire_error_conversion() {
        let wire_err = WireError::TransportClosed {
            reason: "socket reset".to_string(),
        };
        let err: SiroccoError = wire_err.clone().into();
        assert!(err.is_wire_error());
        assert_eq!(err.category(), "wire");
        assert_eq!(err.as_wire_error(), Some(&wire_err));
        assert!(err.as_internal_error().is_none());
    }

    #[test]
    fn test_internal_error_is_fatal() {
        let err: SiroccoError = InternalError::DuplicateSubscription {
            id: SubscriptionId::from(7),
        }
        .into();
        assert!(err.is_internal_error());
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "internal");
    }

    #[test]
    fn test_validation_error_conversion() {
        let err: SiroccoError = ValidationError::EmptySymbol.into();
        assert_eq!(err.category(), "validation");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_serde_roundtrip() {
        let err = SiroccoError::Wire(WireError::SendFailed {
            kind: "activate".to_string(),
            reason: "broken pipe".to_string(),
        });
        let json = serde_json::to_string(&err).unwrap();
        let parsed: SiroccoError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, parsed);
    }
}
