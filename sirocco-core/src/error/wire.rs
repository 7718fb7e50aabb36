//! Transport-related error types.
//!
//! A wire error means the transport refused or failed a physical send. On
//! this failure the engine purges every subscription and surfaces the error
//! to the host; the host decides whether to rebuild the session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport send failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireError {
    /// The transport is no longer connected.
    #[error("[Wire] Transport closed: {reason}")]
    TransportClosed {
        /// Reason the transport reported.
        reason: String,
    },

    /// A request could not be handed to the transport.
    #[error("[Wire] Failed to send {kind} request: {reason}")]
    SendFailed {
        /// Request kind ("activate" or "unsubscribe").
        kind: String,
        /// Reason the send failed.
        reason: String,
    },
}

impl WireError {
    /// Returns the severity level of this error.
    ///
    /// Both variants are recoverable at the session level: the engine
    /// purges its state but keeps working, and the host can rebuild
    /// subscriptions after reconnecting.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        super::ErrorSeverity::Recoverable
    }

    /// Creates a transport-closed error.
    #[must_use]
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::TransportClosed {
            reason: reason.into(),
        }
    }

    /// Creates a send-failed error.
    #[must_use]
    pub fn send_failed(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = WireError::send_failed("activate", "broken pipe");
        assert_eq!(
            error.to_string(),
            "[Wire] Failed to send activate request: broken pipe"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(WireError::closed("gone").severity().is_recoverable());
    }

    #[test]
    fn test_serde_roundtrip() {
        let error = WireError::closed("socket reset");
        let json = serde_json::to_string(&error).unwrap();
        let parsed: WireError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, parsed);
    }
}
