//! Outbound Publisher.
//!
//! Callers hand envelopes to a cloneable [`OutboundPublisher`] backed by a
//! bounded queue. A single [`PublisherWorker`] task reads the queue, encodes
//! each envelope and hands it to the [`BrokerTransport`].
//!
//! ```text
//! caller ──publish()──► [bounded mpsc] ──► PublisherWorker ──► BrokerTransport
//!    ▲        │                                  │
//!    │   Backpressure after                      │ broker refused
//!    │   publish_timeout                         ▼
//!    └──────────────── TransportError ◄── Registry::fail(id)
//! ```

use crate::domain::envelope::Envelope;
use crate::domain::error::TransportError;
use crate::ports::BrokerTransport;
use crate::registry::PendingCallRegistry;
use recruit_telemetry::PUBLISH_FAILURES;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Publisher counters, shared by every handle and the worker.
#[derive(Debug, Default)]
pub struct PublisherStats {
    /// Envelopes accepted into the outbound queue
    pub enqueued: AtomicU64,
    /// Enqueue attempts refused for lack of room
    pub backpressured: AtomicU64,
    /// Envelopes the broker accepted
    pub published: AtomicU64,
    /// Envelopes the broker refused or that failed to encode
    pub failed: AtomicU64,
    /// Envelopes still queued when the worker stopped
    pub abandoned: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PublisherSnapshot {
    pub enqueued: u64,
    pub backpressured: u64,
    pub published: u64,
    pub failed: u64,
    pub abandoned: u64,
}

impl PublisherStats {
    pub fn snapshot(&self) -> PublisherSnapshot {
        PublisherSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            backpressured: self.backpressured.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable handle used by the call facade.
#[derive(Clone)]
pub struct OutboundPublisher {
    sender: mpsc::Sender<Envelope>,
    publish_timeout: Duration,
    stats: Arc<PublisherStats>,
}

impl OutboundPublisher {
    /// Create the handle and the worker that must be spawned to drain it.
    pub fn channel(
        capacity: usize,
        publish_timeout: Duration,
        transport: Arc<dyn BrokerTransport>,
        registry: Arc<PendingCallRegistry>,
    ) -> (Self, PublisherWorker) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(PublisherStats::default());

        let handle = Self {
            sender,
            publish_timeout,
            stats: Arc::clone(&stats),
        };
        let worker = PublisherWorker {
            receiver,
            transport,
            registry,
            stats,
        };
        (handle, worker)
    }

    /// Enqueue an envelope for delivery.
    ///
    /// Returns once the envelope is queued, not once the broker has it.
    /// Waits at most `publish_timeout` for room.
    pub async fn publish(&self, envelope: Envelope) -> Result<(), TransportError> {
        match self.sender.send_timeout(envelope, self.publish_timeout).await {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(SendTimeoutError::Timeout(envelope)) => {
                self.stats.backpressured.fetch_add(1, Ordering::Relaxed);
                warn!(
                    correlation_id = %envelope.correlation_id,
                    queue = %envelope.destination,
                    timeout_ms = self.publish_timeout.as_millis() as u64,
                    "Outbound queue full"
                );
                Err(TransportError::Backpressure(self.publish_timeout))
            }
            Err(SendTimeoutError::Closed(_)) => Err(TransportError::PublisherClosed),
        }
    }

    /// Envelopes waiting for the worker
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn stats(&self) -> &PublisherStats {
        &self.stats
    }
}

/// Drains the outbound queue into the broker.
pub struct PublisherWorker {
    receiver: mpsc::Receiver<Envelope>,
    transport: Arc<dyn BrokerTransport>,
    registry: Arc<PendingCallRegistry>,
    stats: Arc<PublisherStats>,
}

impl PublisherWorker {
    /// Run until every handle is dropped or `shutdown` fires.
    ///
    /// Envelopes still queued at shutdown, and one whose publish is still in
    /// flight, are not published; their calls are failed with
    /// [`TransportError::PublisherClosed`].
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Publisher worker started");

        let mut abandoned = 0u64;
        loop {
            let envelope = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.receiver.recv() => match next {
                    Some(envelope) => envelope,
                    None => {
                        info!("All publisher handles dropped, worker stopping");
                        return;
                    }
                },
            };

            // A broker that stops accepting must not hold up shutdown
            let correlation_id = envelope.correlation_id;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.registry.fail(&correlation_id, TransportError::PublisherClosed);
                    abandoned += 1;
                    break;
                }
                _ = self.deliver(envelope) => {}
            }
        }

        self.receiver.close();
        while let Some(envelope) = self.receiver.recv().await {
            self.registry
                .fail(&envelope.correlation_id, TransportError::PublisherClosed);
            abandoned += 1;
        }
        self.stats.abandoned.fetch_add(abandoned, Ordering::Relaxed);

        info!(abandoned = abandoned, "Publisher worker stopped");
    }

    async fn deliver(&self, envelope: Envelope) {
        let body = match envelope.encode() {
            Ok(body) => body,
            Err(e) => {
                self.reject(&envelope, TransportError::Encode(e.to_string()));
                return;
            }
        };

        match self.transport.publish(&envelope.destination, body).await {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %envelope.correlation_id,
                    queue = %envelope.destination,
                    message_type = %envelope.message_type,
                    "Envelope published"
                );
            }
            Err(e) => self.reject(&envelope, e),
        }
    }

    fn reject(&self, envelope: &Envelope, error: TransportError) {
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        PUBLISH_FAILURES.inc();
        warn!(
            correlation_id = %envelope.correlation_id,
            queue = %envelope.destination,
            error = %error,
            "Envelope not published"
        );
        // The call may already have timed out; nothing else to do then.
        self.registry.fail(&envelope.correlation_id, error);
    }
}
