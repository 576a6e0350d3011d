//! # Deliveries
//!
//! The unit handed from a queue to its consumer, and the broker error type.

use bytes::Bytes;
use thiserror::Error;

/// A message taken off a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Queue the message was published to.
    pub queue: String,
    /// Raw message body.
    pub body: Bytes,
    /// Broker-wide monotonically increasing tag.
    pub delivery_tag: u64,
}

impl Delivery {
    /// Body as a byte slice.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Errors surfaced by the broker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker was closed.
    #[error("broker closed")]
    Closed,

    /// The queue's consumer went away; nothing will read this message.
    #[error("queue {0} closed")]
    QueueClosed(String),

    /// The queue already has its exclusive consumer.
    #[error("queue {0} already has a consumer")]
    AlreadyConsumed(String),

    /// Queue names must be non-empty.
    #[error("invalid queue name")]
    InvalidQueueName,
}
