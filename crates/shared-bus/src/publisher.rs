//! # Queue Publisher
//!
//! Defines the publishing side of the broker and the in-memory broker itself.

use crate::delivery::{BrokerError, Delivery};
use crate::subscriber::QueueSubscription;
use crate::DEFAULT_QUEUE_CAPACITY;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Trait for publishing raw messages onto a named queue.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publish `body` onto `queue`.
    ///
    /// Waits while the queue is full. Fails if the broker is closed or the
    /// queue's consumer has gone away.
    async fn publish(&self, queue: &str, body: Bytes) -> Result<(), BrokerError>;

    /// Get the total number of messages accepted.
    fn messages_published(&self) -> u64;
}

/// A declared queue. The receiver is parked here until a consumer claims it.
struct QueueSlot {
    sender: mpsc::Sender<Delivery>,
    receiver: Option<mpsc::Receiver<Delivery>>,
}

/// In-memory implementation of the broker.
///
/// Each queue is a bounded `tokio::sync::mpsc` channel. Suitable for a single
/// process; a deployment talks to a real AMQP broker through the same
/// [`QueuePublisher`] / [`QueueSubscription`] shape.
pub struct InMemoryBroker {
    /// Declared queues by name.
    queues: RwLock<HashMap<String, QueueSlot>>,

    /// Next delivery tag.
    next_tag: AtomicU64,

    /// Total messages accepted.
    messages_published: AtomicU64,

    /// Set once `close` is called.
    closed: AtomicBool,

    /// Per-queue capacity.
    capacity: usize,
}

impl InMemoryBroker {
    /// Create a new broker with default per-queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a new broker with the given per-queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            next_tag: AtomicU64::new(1),
            messages_published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            capacity: capacity.max(1),
        }
    }

    /// Declare a queue. Declaring an existing queue is a no-op.
    pub fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.sender_for(queue).map(|_| ())
    }

    /// Claim the exclusive consumer of `queue`, declaring it if needed.
    pub fn subscribe(&self, queue: &str) -> Result<QueueSubscription, BrokerError> {
        if queue.is_empty() {
            return Err(BrokerError::InvalidQueueName);
        }
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }

        let mut queues = self.queues.write().map_err(|_| BrokerError::Closed)?;
        let slot = queues
            .entry(queue.to_string())
            .or_insert_with(|| Self::new_slot(self.capacity));

        let receiver = slot
            .receiver
            .take()
            .ok_or_else(|| BrokerError::AlreadyConsumed(queue.to_string()))?;

        debug!(queue = queue, "Consumer attached");
        Ok(QueueSubscription::new(queue.to_string(), receiver))
    }

    /// Close the broker. Pending messages stay readable by existing
    /// consumers; new publishes fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut queues) = self.queues.write() {
            queues.clear();
        }
        debug!("Broker closed");
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of declared queues.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.queues.read().map(|q| q.len()).unwrap_or(0)
    }

    /// Per-queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn new_slot(capacity: usize) -> QueueSlot {
        let (sender, receiver) = mpsc::channel(capacity);
        QueueSlot {
            sender,
            receiver: Some(receiver),
        }
    }

    /// Clone the sender for `queue`, declaring it if needed. The lock is
    /// released before any await on the channel.
    fn sender_for(&self, queue: &str) -> Result<mpsc::Sender<Delivery>, BrokerError> {
        if queue.is_empty() {
            return Err(BrokerError::InvalidQueueName);
        }
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }

        if let Ok(queues) = self.queues.read() {
            if let Some(slot) = queues.get(queue) {
                return Ok(slot.sender.clone());
            }
        }

        let mut queues = self.queues.write().map_err(|_| BrokerError::Closed)?;
        let slot = queues
            .entry(queue.to_string())
            .or_insert_with(|| Self::new_slot(self.capacity));
        Ok(slot.sender.clone())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueuePublisher for InMemoryBroker {
    async fn publish(&self, queue: &str, body: Bytes) -> Result<(), BrokerError> {
        let sender = self.sender_for(queue)?;
        let delivery = Delivery {
            queue: queue.to_string(),
            body,
            delivery_tag: self.next_tag.fetch_add(1, Ordering::Relaxed),
        };
        let tag = delivery.delivery_tag;

        match sender.send(delivery).await {
            Ok(()) => {
                self.messages_published.fetch_add(1, Ordering::Relaxed);
                debug!(queue = queue, delivery_tag = tag, "Message published");
                Ok(())
            }
            Err(_) => {
                warn!(queue = queue, delivery_tag = tag, "Message dropped (consumer gone)");
                Err(BrokerError::QueueClosed(queue.to_string()))
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}
