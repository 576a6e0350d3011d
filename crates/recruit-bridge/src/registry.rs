//! Correlation Registry - maps in-flight correlation IDs to their reply slots.
//!
//! Flow:
//! 1. The call facade mints a [`CorrelationId`] and calls `register()` to get
//!    a oneshot receiver
//! 2. The facade publishes the envelope carrying that ID
//! 3. The dispatcher calls `resolve()` when the reply lands, or the publisher
//!    calls `fail()` when the broker refuses the envelope
//! 4. On timeout or cancellation the facade calls `remove()`
//!
//! Whichever of resolve/fail/remove takes the entry out of the map wins;
//! removal is a single atomic map operation so there is exactly one winner.
//!
//! Once the reply queue is gone the dispatcher calls `close()`. Callers check
//! `closed_reason()` after registering, so a call racing the close is either
//! failed by it or sees the reason.

use crate::domain::correlation::CorrelationId;
use crate::domain::envelope::ReplyFrame;
use crate::domain::error::{DuplicateCorrelation, TransportError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use recruit_telemetry::PENDING_CALLS;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// What a pending call eventually receives.
pub type ReplySlot = Result<ReplyFrame, TransportError>;

/// Receiving half handed back by [`PendingCallRegistry::register`].
pub type ReplyReceiver = oneshot::Receiver<ReplySlot>;

/// A call waiting for its reply
struct PendingCall {
    /// Single-use delivery slot
    sender: oneshot::Sender<ReplySlot>,
    /// When the call was registered
    registered_at: Instant,
    /// Message type (for logging)
    message_type: String,
}

/// Registry counters
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Calls registered
    pub registered: AtomicU64,
    /// Calls completed with a reply frame
    pub resolved: AtomicU64,
    /// Calls completed with a transport failure
    pub failed: AtomicU64,
    /// Entries removed by timeout, cancellation or caller drop
    pub removed: AtomicU64,
    /// Completions that found no entry (late, duplicate or unknown)
    pub unmatched: AtomicU64,
    /// Completions whose caller had already stopped listening
    pub abandoned: AtomicU64,
}

/// Point-in-time copy of [`RegistryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RegistrySnapshot {
    pub pending: usize,
    pub registered: u64,
    pub resolved: u64,
    pub failed: u64,
    pub removed: u64,
    pub unmatched: u64,
    pub abandoned: u64,
}

/// Concurrency-safe correlation registry.
///
/// The map is never exposed; all access goes through register/resolve/fail/remove.
#[derive(Default)]
pub struct PendingCallRegistry {
    /// Map of correlation ID to pending call
    pending: DashMap<CorrelationId, PendingCall>,
    /// Statistics
    stats: RegistryStats,
    /// Set once no reply can ever arrive again
    closed: OnceLock<TransportError>,
}

impl PendingCallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending call and get the receiver its reply will land in.
    ///
    /// A duplicate ID means the ID source is broken; the existing entry is
    /// left untouched and the new registration is refused.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        message_type: &str,
    ) -> Result<ReplyReceiver, DuplicateCorrelation> {
        let (tx, rx) = oneshot::channel();

        match self.pending.entry(correlation_id) {
            Entry::Occupied(_) => {
                error!(
                    correlation_id = %correlation_id,
                    message_type = message_type,
                    "Correlation ID already registered"
                );
                return Err(DuplicateCorrelation(correlation_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingCall {
                    sender: tx,
                    registered_at: Instant::now(),
                    message_type: message_type.to_string(),
                });
            }
        }

        self.stats.registered.fetch_add(1, Ordering::Relaxed);
        PENDING_CALLS.inc();

        debug!(
            correlation_id = %correlation_id,
            message_type = message_type,
            "Registered pending call"
        );

        Ok(rx)
    }

    /// Deliver a reply frame and remove the entry.
    ///
    /// Returns true if the entry existed and its caller received the frame.
    /// Returns false for unknown, late or duplicate replies; those have no
    /// side effect beyond a counter.
    pub fn resolve(&self, correlation_id: &CorrelationId, frame: ReplyFrame) -> bool {
        self.complete(correlation_id, Ok(frame))
    }

    /// Fail a pending call with a transport error and remove the entry.
    ///
    /// Same exactly-once rule as [`resolve`](Self::resolve).
    pub fn fail(&self, correlation_id: &CorrelationId, error: TransportError) -> bool {
        self.complete(correlation_id, Err(error))
    }

    /// Remove an entry without delivering anything.
    ///
    /// Idempotent. Returns true only for the call that actually removed it.
    pub fn remove(&self, correlation_id: &CorrelationId) -> bool {
        match self.pending.remove(correlation_id) {
            Some((_, call)) => {
                PENDING_CALLS.dec();
                self.stats.removed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    message_type = %call.message_type,
                    waited_ms = call.registered_at.elapsed().as_millis() as u64,
                    "Removed pending call"
                );
                true
            }
            None => false,
        }
    }

    fn complete(&self, correlation_id: &CorrelationId, slot: ReplySlot) -> bool {
        let Some((_, call)) = self.pending.remove(correlation_id) else {
            self.stats.unmatched.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        PENDING_CALLS.dec();

        let waited = call.registered_at.elapsed();
        let delivered_error = slot.is_err();

        match call.sender.send(slot) {
            Ok(()) => {
                let counter = if delivered_error {
                    &self.stats.failed
                } else {
                    &self.stats.resolved
                };
                counter.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    message_type = %call.message_type,
                    waited_ms = waited.as_millis() as u64,
                    "Completed pending call"
                );
                true
            }
            Err(_) => {
                // Receiver was dropped (caller stopped waiting)
                self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    message_type = %call.message_type,
                    "Pending call receiver dropped"
                );
                false
            }
        }
    }

    /// Fail every pending call, e.g. on shutdown. Returns how many were failed.
    pub fn fail_all(&self, error: TransportError) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|entry| *entry.key()).collect();
        ids.iter()
            .filter(|id| self.fail(id, error.clone()))
            .count()
    }

    /// Mark the registry closed and fail every pending call with `error`.
    ///
    /// The first reason sticks. Returns how many calls were failed.
    pub fn close(&self, error: TransportError) -> usize {
        if self.closed.set(error.clone()).is_err() {
            debug!("Registry already closed");
        }
        let reason = self.closed.get().cloned().unwrap_or(error);
        let failed = self.fail_all(reason.clone());
        warn!(failed = failed, reason = %reason, "Correlation registry closed");
        failed
    }

    /// Why the registry was closed, if it was
    pub fn closed_reason(&self) -> Option<TransportError> {
        self.closed.get().cloned()
    }

    /// Check if a correlation ID is pending
    pub fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Number of calls currently waiting
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Age of the oldest pending call, if any
    pub fn oldest_age(&self) -> Option<Duration> {
        self.pending
            .iter()
            .map(|entry| entry.value().registered_at.elapsed())
            .max()
    }

    /// Get statistics
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            pending: self.len(),
            registered: self.stats.registered.load(Ordering::Relaxed),
            resolved: self.stats.resolved.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            removed: self.stats.removed.load(Ordering::Relaxed),
            unmatched: self.stats.unmatched.load(Ordering::Relaxed),
            abandoned: self.stats.abandoned.load(Ordering::Relaxed),
        }
    }
}
