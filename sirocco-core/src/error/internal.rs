//! Invariant violation error types.
//!
//! These indicate a logic defect inside the engine, never a condition the
//! publisher or the host caused. They are not retried: the engine purges the
//! affected scope and lets the error propagate so the defect fails loudly.

use crate::types::SubscriptionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine invariant violation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternalError {
    /// A subscription id was registered twice.
    #[error("[Internal] Subscription {id} registered twice")]
    DuplicateSubscription {
        /// The duplicated id.
        id: SubscriptionId,
    },

    /// A component referenced a subscription the engine does not know.
    #[error("[Internal] Unknown subscription {id} in {operation}")]
    UnknownSubscription {
        /// The unknown id.
        id: SubscriptionId,
        /// Operation that hit the missing entry.
        operation: String,
    },

    /// A state machine was asked for a transition it has no edge for.
    #[error("[Internal] Invalid transition from {state} on {event}")]
    InvalidTransition {
        /// State the subscription was in.
        state: String,
        /// Event that had no edge.
        event: String,
    },

    /// The by-key map disagrees with the by-id map.
    #[error("[Internal] Key map inconsistent for '{key}'")]
    KeyMapInconsistent {
        /// The feed key whose entry is wrong.
        key: String,
    },
}

impl InternalError {
    /// Returns the severity level of this error. Always fatal.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        super::ErrorSeverity::Fatal
    }

    /// Creates an unknown-subscription error.
    #[must_use]
    pub fn unknown(id: SubscriptionId, operation: impl Into<String>) -> Self {
        Self::UnknownSubscription {
            id,
            operation: operation.into(),
        }
    }

    /// Creates an invalid-transition error.
    #[must_use]
    pub fn invalid_transition(state: impl Into<String>, event: impl Into<String>) -> Self {
        Self::InvalidTransition {
            state: state.into(),
            event: event.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_fatal() {
        let errors = [
            InternalError::DuplicateSubscription {
                id: SubscriptionId::from(1),
            },
            InternalError::unknown(SubscriptionId::from(2), "route_message"),
            InternalError::invalid_transition("Synchronised", "first_response"),
            InternalError::KeyMapInconsistent {
                key: "trades/BTC-USDT".to_string(),
            },
        ];
        for error in errors {
            assert!(error.severity().is_fatal(), "{error}");
        }
    }

    #[test]
    fn test_display() {
        let error = InternalError::unknown(SubscriptionId::from(9), "activate");
        assert_eq!(error.to_string(), "[Internal] Unknown subscription sub-9 in activate");
    }
}
