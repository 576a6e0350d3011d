//! Bridge error taxonomy.
//!
//! Every call ends in exactly one of these. Callers branch on the kind:
//! a [`BridgeError::Timeout`] means "unknown, maybe try later" while a
//! [`BridgeError::Application`] means the remote service definitely said no.

use crate::domain::correlation::CorrelationId;
use std::time::Duration;
use thiserror::Error;

/// Failures at the broker boundary. The envelope is known not to have been
/// delivered (or its reply path is gone), unlike a timeout.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The outbound queue stayed full for the whole publish timeout
    #[error("outbound queue full for {0:?}")]
    Backpressure(Duration),
    /// The publisher worker is gone
    #[error("publisher stopped")]
    PublisherClosed,
    /// The broker refused the message
    #[error("broker rejected message for queue {queue}: {reason}")]
    Broker { queue: String, reason: String },
    /// The request could not be serialized
    #[error("failed to encode request: {0}")]
    Encode(String),
    /// The pending slot was torn down without a reply
    #[error("reply slot dropped")]
    ReplyDropped,
    /// The reply queue consumer is gone; no reply can arrive any more
    #[error("reply queue closed")]
    ReplyQueueClosed,
}

/// Invariant violation: a freshly minted correlation ID was already pending.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("correlation id {0} already registered")]
pub struct DuplicateCorrelation(pub CorrelationId);

/// Error returned by a bridged call.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// No reply arrived within the bound. The registry entry is gone.
    #[error("no reply to {message_type} ({correlation_id}) within {timeout:?}")]
    Timeout {
        correlation_id: CorrelationId,
        message_type: String,
        timeout: Duration,
    },

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The remote service answered with an `error` field.
    #[error("{message_type} rejected: {message}")]
    Application {
        message_type: String,
        message: String,
        /// The raw `error` value from the reply
        details: serde_json::Value,
    },

    /// The reply did not have the shape the typed client expected.
    #[error("cannot decode {message_type} reply: {reason}")]
    Decode { message_type: String, reason: String },

    /// The request was refused locally and never sent.
    #[error("invalid {message_type} request: {reason}")]
    InvalidRequest { message_type: String, reason: String },

    /// The caller's cancellation token fired first.
    #[error("call {correlation_id} cancelled")]
    Cancelled { correlation_id: CorrelationId },

    #[error(transparent)]
    DuplicateCorrelation(#[from] DuplicateCorrelation),
}

impl BridgeError {
    /// Whether trying the same call again can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Transport(TransportError::Backpressure(_))
                | Self::Transport(TransportError::Broker { .. })
        )
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transport(_) => "transport",
            Self::Application { .. } => "application",
            Self::Decode { .. } => "decode",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Cancelled { .. } => "cancelled",
            Self::DuplicateCorrelation(_) => "duplicate",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias for bridged calls.
pub type BridgeResult<T> = Result<T, BridgeError>;
