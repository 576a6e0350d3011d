//! Shared-bus adapter.
//!
//! Implements [`BrokerTransport`] and [`ReplySource`] on top of the
//! `shared-bus` queue broker.

use crate::domain::error::TransportError;
use crate::ports::{BrokerTransport, ReplySource};
use async_trait::async_trait;
use bytes::Bytes;
use shared_bus::{BrokerError, QueuePublisher, QueueSubscription};
use std::sync::Arc;
use tracing::debug;

/// Publishes envelopes through any shared-bus [`QueuePublisher`].
#[derive(Clone)]
pub struct SharedBusTransport {
    publisher: Arc<dyn QueuePublisher>,
}

impl SharedBusTransport {
    pub fn new(publisher: Arc<dyn QueuePublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl BrokerTransport for SharedBusTransport {
    async fn publish(&self, queue: &str, body: Bytes) -> Result<(), TransportError> {
        self.publisher
            .publish(queue, body)
            .await
            .map_err(|e| broker_error(queue, e))
    }
}

fn broker_error(queue: &str, error: BrokerError) -> TransportError {
    TransportError::Broker {
        queue: queue.to_string(),
        reason: error.to_string(),
    }
}

#[async_trait]
impl ReplySource for QueueSubscription {
    async fn next_frame(&mut self) -> Option<Bytes> {
        let delivery = self.recv().await?;
        debug!(
            queue = %delivery.queue,
            delivery_tag = delivery.delivery_tag,
            "Reply body received"
        );
        Some(delivery.body)
    }
}
