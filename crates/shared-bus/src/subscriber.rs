//! # Queue Subscriber
//!
//! Defines the consuming side of a queue.

use crate::delivery::{BrokerError, Delivery};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_stream::Stream;
use tracing::debug;

/// The exclusive consumer of one queue.
///
/// When dropped, the queue stops accepting messages.
pub struct QueueSubscription {
    /// Queue this subscription consumes.
    queue: String,

    /// Receiving half of the queue.
    receiver: mpsc::Receiver<Delivery>,
}

impl QueueSubscription {
    pub(crate) fn new(queue: String, receiver: mpsc::Receiver<Delivery>) -> Self {
        Self { queue, receiver }
    }

    /// Receive the next delivery.
    ///
    /// # Returns
    ///
    /// - `Some(delivery)` - The next message on the queue
    /// - `None` - The broker was closed and the queue is drained
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Try to receive the next delivery without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(delivery))` - A message was available
    /// - `Ok(None)` - The queue is currently empty
    /// - `Err(BrokerError::QueueClosed)` - The broker was closed and the queue is drained
    pub fn try_recv(&mut self) -> Result<Option<Delivery>, BrokerError> {
        match self.receiver.try_recv() {
            Ok(delivery) => Ok(Some(delivery)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BrokerError::QueueClosed(self.queue.clone())),
        }
    }

    /// Name of the consumed queue.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Convert into a `Stream` of deliveries.
    #[must_use]
    pub fn into_stream(self) -> DeliveryStream {
        DeliveryStream { subscription: self }
    }
}

impl Drop for QueueSubscription {
    fn drop(&mut self) {
        debug!(queue = %self.queue, "Consumer detached");
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct DeliveryStream {
    subscription: QueueSubscription,
}

impl DeliveryStream {
    /// Name of the consumed queue.
    #[must_use]
    pub fn queue(&self) -> &str {
        self.subscription.queue()
    }
}

impl Stream for DeliveryStream {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.subscription.receiver.poll_recv(cx)
    }
}
