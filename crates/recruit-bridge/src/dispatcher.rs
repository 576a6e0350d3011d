//! Inbound Dispatcher - the single reader of this service's reply queue.
//!
//! Every body is decoded into a [`ReplyFrame`] and routed to the matching
//! registry entry. Frames that match nothing (late, duplicate, unknown or
//! garbage) are logged and counted and never stop the loop.

use crate::domain::envelope::ReplyFrame;
use crate::domain::error::TransportError;
use crate::ports::ReplySource;
use crate::registry::PendingCallRegistry;
use recruit_telemetry::DISPATCHER_FRAMES;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handed to a waiting call
    Delivered,
    /// Valid frame with no waiting call
    Unmatched,
    /// Could not be decoded
    Malformed,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Unmatched => "unmatched",
            Self::Malformed => "malformed",
        }
    }
}

/// Dispatcher counters
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub received: AtomicU64,
    pub delivered: AtomicU64,
    pub unmatched: AtomicU64,
    pub malformed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DispatcherSnapshot {
    pub received: u64,
    pub delivered: u64,
    pub unmatched: u64,
    pub malformed: u64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherSnapshot {
        DispatcherSnapshot {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Routes reply frames into the registry.
pub struct InboundDispatcher {
    registry: Arc<PendingCallRegistry>,
    stats: Arc<DispatcherStats>,
}

impl InboundDispatcher {
    pub fn new(registry: Arc<PendingCallRegistry>) -> Self {
        Self {
            registry,
            stats: Arc::new(DispatcherStats::default()),
        }
    }

    /// Handle one raw body from the reply queue.
    ///
    /// Never blocks: resolving a registry entry is a map removal plus a
    /// oneshot send.
    pub fn dispatch(&self, body: &[u8]) -> DispatchOutcome {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let outcome = match ReplyFrame::decode(body) {
            Ok(frame) => self.route(frame),
            Err(e) => {
                warn!(error = %e, bytes = body.len(), "Dropping malformed reply frame");
                DispatchOutcome::Malformed
            }
        };

        let counter = match outcome {
            DispatchOutcome::Delivered => &self.stats.delivered,
            DispatchOutcome::Unmatched => &self.stats.unmatched,
            DispatchOutcome::Malformed => &self.stats.malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        DISPATCHER_FRAMES.with_label_values(&[outcome.as_str()]).inc();

        outcome
    }

    fn route(&self, frame: ReplyFrame) -> DispatchOutcome {
        let correlation_id = frame.correlation_id;
        let message_type = frame.message_type.clone();

        if self.registry.resolve(&correlation_id, frame) {
            debug!(
                correlation_id = %correlation_id,
                message_type = %message_type,
                "Reply delivered"
            );
            DispatchOutcome::Delivered
        } else {
            warn!(
                correlation_id = %correlation_id,
                message_type = %message_type,
                "Dropping reply with no pending call"
            );
            DispatchOutcome::Unmatched
        }
    }

    /// Read `source` until it closes or `shutdown` fires.
    ///
    /// A source that closes on its own closes the registry too: waiting calls
    /// fail with [`TransportError::ReplyQueueClosed`] and new ones are refused.
    pub async fn run<S: ReplySource>(&self, mut source: S, shutdown: CancellationToken) {
        info!("Inbound dispatcher started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Inbound dispatcher shutting down");
                    break;
                }
                next = source.next_frame() => match next {
                    Some(body) => {
                        self.dispatch(&body);
                    }
                    None => {
                        let failed = self.registry.close(TransportError::ReplyQueueClosed);
                        error!(failed = failed, "Reply queue closed, dispatcher stopping");
                        break;
                    }
                },
            }
        }
    }

    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    pub fn registry(&self) -> &Arc<PendingCallRegistry> {
        &self.registry
    }
}
