//! Wire boundary types.
//!
//! The engine never encodes or decodes a publisher protocol itself. Hosts
//! decode inbound traffic into [`PublisherMessage`] values and hand encoded
//! delivery of [`OutboundRequest`] values to their transport. Every message
//! in both directions carries the subscription id and the request number of
//! the activation it answers, which is what lets the engine discard stale
//! responses after a re-activation.

use crate::data::FeedPayload;
use crate::definition::{DataDefinition, RequestPriority};
use crate::types::{RequestNr, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a publisher fault may be recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryDirective {
    /// Terminal; the subscription goes to its error state.
    Never,
    /// Retry after a backoff delay.
    Delay,
    /// Retry once the publisher's capability improves.
    SubscribabilityIncrease,
}

impl fmt::Display for RetryDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Never => "never",
            Self::Delay => "delay",
            Self::SubscribabilityIncrease => "subscribability_increase",
        };
        write!(f, "{s}")
    }
}

/// A subscription-level error reported by the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherFault {
    /// Publisher-defined error code.
    pub code: u32,
    /// Human-readable error text.
    pub message: String,
    /// Recovery the publisher permits for this fault.
    pub retry: RetryDirective,
}

impl PublisherFault {
    /// Creates a fault.
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>, retry: RetryDirective) -> Self {
        Self {
            code,
            message: message.into(),
            retry,
        }
    }
}

impl fmt::Display for PublisherFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {} ({}): {}", self.code, self.retry, self.message)
    }
}

/// Payload of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageBody {
    /// A decoded data record.
    Data(FeedPayload),
    /// The initial image is complete; the subscription is synchronised.
    SyncComplete,
    /// A subscription-level fault.
    Fault(PublisherFault),
}

/// One inbound message from the publisher, already decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherMessage {
    /// Subscription the message addresses.
    pub subscription: SubscriptionId,
    /// Request number the message answers.
    pub request_nr: RequestNr,
    /// Message payload.
    pub body: MessageBody,
}

impl PublisherMessage {
    /// Creates a data message.
    #[must_use]
    pub const fn data(
        subscription: SubscriptionId,
        request_nr: RequestNr,
        payload: FeedPayload,
    ) -> Self {
        Self {
            subscription,
            request_nr,
            body: MessageBody::Data(payload),
        }
    }

    /// Creates a synchronisation-complete message.
    #[must_use]
    pub const fn sync_complete(subscription: SubscriptionId, request_nr: RequestNr) -> Self {
        Self {
            subscription,
            request_nr,
            body: MessageBody::SyncComplete,
        }
    }

    /// Creates a fault message.
    #[must_use]
    pub const fn fault(
        subscription: SubscriptionId,
        request_nr: RequestNr,
        fault: PublisherFault,
    ) -> Self {
        Self {
            subscription,
            request_nr,
            body: MessageBody::Fault(fault),
        }
    }

    /// Returns true for a data message.
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self.body, MessageBody::Data(_))
    }

    /// Returns true for a fault message.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self.body, MessageBody::Fault(_))
    }
}

/// What an outbound request asks the publisher to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Start (or restart) delivering the defined feed.
    Activate {
        /// The feed being requested.
        definition: DataDefinition,
    },
    /// Stop delivering the feed.
    Unsubscribe,
}

impl RequestKind {
    /// Returns the kind as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Activate { .. } => "activate",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One outbound request handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Subscription the request belongs to.
    pub subscription: SubscriptionId,
    /// Request number; echoed by the publisher in every answer.
    pub request_nr: RequestNr,
    /// Activate or unsubscribe.
    pub kind: RequestKind,
    /// Queue the request is scheduled on.
    pub priority: RequestPriority,
}

impl OutboundRequest {
    /// Creates an activation request.
    #[must_use]
    pub fn activate(
        subscription: SubscriptionId,
        request_nr: RequestNr,
        definition: DataDefinition,
    ) -> Self {
        let priority = definition.priority;
        Self {
            subscription,
            request_nr,
            kind: RequestKind::Activate { definition },
            priority,
        }
    }

    /// Creates an unsubscribe request.
    ///
    /// Unsubscribes free publisher resources, so they always travel on the
    /// high-priority queue regardless of the definition's priority.
    #[must_use]
    pub const fn unsubscribe(subscription: SubscriptionId, request_nr: RequestNr) -> Self {
        Self {
            subscription,
            request_nr,
            kind: RequestKind::Unsubscribe,
            priority: RequestPriority::High,
        }
    }

    /// Returns true for an activation request.
    #[must_use]
    pub const fn is_activate(&self) -> bool {
        matches!(self.kind, RequestKind::Activate { .. })
    }

    /// Returns true for an unsubscribe request.
    #[must_use]
    pub const fn is_unsubscribe(&self) -> bool {
        matches!(self.kind, RequestKind::Unsubscribe)
    }
}
