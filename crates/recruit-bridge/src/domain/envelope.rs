//! Envelopes, reply frames and their JSON wire form.
//!
//! On the wire every message is
//!
//! ```json
//! { "id": "<correlation id>", "message_type": "...", "message_data": { ... } }
//! ```
//!
//! Outbound envelopes add `"reply_to"` so the remote service knows which
//! queue to answer on. `message_data` is opaque to the bridge.

use crate::domain::correlation::CorrelationId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Open key-value payload of a message.
pub type MessageData = Map<String, Value>;

/// Key inside `message_data` through which a remote service reports a
/// business-level failure.
pub const ERROR_FIELD: &str = "error";

/// Wire encoding errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid correlation id {0:?}")]
    InvalidCorrelationId(String),
}

/// Serialized shape shared by envelopes and replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: String,
    pub message_type: String,
    #[serde(default)]
    pub message_data: MessageData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl WireMessage {
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(body: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Outbound request. Immutable once handed to the publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Fresh per call
    pub correlation_id: CorrelationId,
    /// Queue of the sibling service that should handle the request
    pub destination: String,
    pub message_type: String,
    pub payload: MessageData,
    /// This service's own reply queue
    pub reply_to: String,
}

impl Envelope {
    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            id: self.correlation_id.to_string(),
            message_type: self.message_type.clone(),
            message_data: self.payload.clone(),
            reply_to: Some(self.reply_to.clone()),
        }
    }

    /// Encode to the bytes handed to the broker.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        self.to_wire().encode()
    }
}

/// Inbound reply pulled off the reply queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyFrame {
    pub correlation_id: CorrelationId,
    pub message_type: String,
    pub payload: MessageData,
}

impl ReplyFrame {
    pub fn new(
        correlation_id: CorrelationId,
        message_type: impl Into<String>,
        payload: MessageData,
    ) -> Self {
        Self {
            correlation_id,
            message_type: message_type.into(),
            payload,
        }
    }

    /// Build from the wire form. Replies whose `id` is not a correlation ID
    /// cannot belong to any call and are rejected here.
    pub fn from_wire(wire: WireMessage) -> Result<Self, CodecError> {
        let correlation_id = CorrelationId::parse(&wire.id)
            .map_err(|_| CodecError::InvalidCorrelationId(wire.id.clone()))?;
        Ok(Self {
            correlation_id,
            message_type: wire.message_type,
            payload: wire.message_data,
        })
    }

    pub fn decode(body: &[u8]) -> Result<Self, CodecError> {
        Self::from_wire(WireMessage::decode(body)?)
    }

    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            id: self.correlation_id.to_string(),
            message_type: self.message_type.clone(),
            message_data: self.payload.clone(),
            reply_to: None,
        }
    }

    /// Business-level failure reported by the remote side, if any.
    ///
    /// `null`, `false` and the empty string mean "no error". A string is the
    /// message itself; an object contributes its `message` field when it has
    /// one and is rendered whole otherwise.
    pub fn application_error(&self) -> Option<String> {
        match self.payload.get(ERROR_FIELD)? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => match obj.get("message") {
                Some(Value::String(msg)) => Some(msg.clone()),
                _ => Some(Value::Object(obj.clone()).to_string()),
            },
            other => Some(other.to_string()),
        }
    }
}
