//! Outbound port: handing encoded envelopes to the broker.

use crate::domain::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;

/// Publishes raw bodies onto named queues.
///
/// Implementations report a refused message as [`TransportError::Broker`];
/// the publisher worker turns that into a fast failure of the waiting call.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn publish(&self, queue: &str, body: Bytes) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: BrokerTransport + ?Sized> BrokerTransport for std::sync::Arc<T> {
    async fn publish(&self, queue: &str, body: Bytes) -> Result<(), TransportError> {
        (**self).publish(queue, body).await
    }
}
