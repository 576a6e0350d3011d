//! Synchronous Call Facade.
//!
//! Turns publish-then-wait-for-reply into one awaited call:
//!
//! ```text
//! Idle ──register──► Registered ──publish──► waiting ─┬─ reply ─────► Resolved
//!                                                     ├─ timer ─────► TimedOut
//!                                                     └─ cancel ────► Cancelled
//! ```
//!
//! Timer and cancellation both end in `Registry::remove`. If that removal
//! loses to a concurrent `resolve`, the reply is already in the slot and the
//! call completes as Resolved instead.

use crate::domain::correlation::CorrelationId;
use crate::domain::envelope::{Envelope, MessageData, ReplyFrame, ERROR_FIELD};
use crate::domain::error::{BridgeError, BridgeResult, TransportError};
use crate::publisher::OutboundPublisher;
use crate::registry::{PendingCallRegistry, ReplyReceiver, ReplySlot};
use recruit_telemetry::{BRIDGE_CALLS, BRIDGE_CALL_DURATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Wait bound; the bridge default when `None`
    pub timeout: Option<Duration>,
    /// Caller-side cancellation, e.g. the caller's own request being aborted
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// What ended the wait.
enum Wake {
    Reply(Result<ReplySlot, RecvError>),
    Expired,
    Cancelled,
}

/// Removes the registry entry if the call future is dropped mid-wait.
struct RegistrationGuard<'a> {
    registry: &'a PendingCallRegistry,
    correlation_id: CorrelationId,
    armed: bool,
}

impl<'a> RegistrationGuard<'a> {
    fn new(registry: &'a PendingCallRegistry, correlation_id: CorrelationId) -> Self {
        Self {
            registry,
            correlation_id,
            armed: true,
        }
    }

    /// The entry is known to be gone.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RegistrationGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.registry.remove(&self.correlation_id) {
            debug!(
                correlation_id = %self.correlation_id,
                "Call abandoned, pending entry removed"
            );
        }
    }
}

/// The request/reply bridge every integration client calls through.
#[derive(Clone)]
pub struct RpcBridge {
    registry: Arc<PendingCallRegistry>,
    publisher: OutboundPublisher,
    reply_queue: Arc<str>,
    default_timeout: Duration,
}

impl RpcBridge {
    pub fn new(
        registry: Arc<PendingCallRegistry>,
        publisher: OutboundPublisher,
        reply_queue: impl Into<Arc<str>>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            publisher,
            reply_queue: reply_queue.into(),
            default_timeout,
        }
    }

    /// Call with the default timeout.
    pub async fn call(
        &self,
        destination: &str,
        message_type: &str,
        payload: MessageData,
    ) -> BridgeResult<MessageData> {
        self.call_with(destination, message_type, payload, CallOptions::default())
            .await
    }

    /// Publish `payload` to `destination` and wait for the matching reply.
    ///
    /// Returns the reply's `message_data`, or exactly one error kind. The
    /// registry entry is gone by the time this returns, whatever the outcome.
    pub async fn call_with(
        &self,
        destination: &str,
        message_type: &str,
        payload: MessageData,
        options: CallOptions,
    ) -> BridgeResult<MessageData> {
        let _timer = recruit_telemetry::time_histogram!(BRIDGE_CALL_DURATION);
        let result = self
            .execute(destination, message_type, payload, options)
            .await
            .and_then(|frame| check_application_error(message_type, frame));

        let outcome = match &result {
            Ok(_) => "resolved",
            Err(e) => e.kind(),
        };
        BRIDGE_CALLS.with_label_values(&[message_type, outcome]).inc();

        result
    }

    async fn execute(
        &self,
        destination: &str,
        message_type: &str,
        payload: MessageData,
        options: CallOptions,
    ) -> BridgeResult<ReplyFrame> {
        let correlation_id = CorrelationId::new();

        if options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(BridgeError::Cancelled { correlation_id });
        }

        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let receiver = self.registry.register(correlation_id, message_type)?;
        let mut guard = RegistrationGuard::new(&self.registry, correlation_id);
        if let Some(reason) = self.registry.closed_reason() {
            return Err(reason.into());
        }

        let envelope = Envelope {
            correlation_id,
            destination: destination.to_string(),
            message_type: message_type.to_string(),
            payload,
            reply_to: self.reply_queue.to_string(),
        };
        // A failed publish leaves the entry for the guard to remove
        let publish = self.publisher.publish(envelope);
        match options.cancel.as_ref() {
            Some(token) => tokio::select! {
                biased;
                sent = publish => sent?,
                _ = token.cancelled() => {
                    debug!(correlation_id = %correlation_id, "Call cancelled while enqueueing");
                    return Err(BridgeError::Cancelled { correlation_id });
                }
            },
            None => publish.await?,
        }

        debug!(
            correlation_id = %correlation_id,
            queue = destination,
            message_type = message_type,
            timeout_ms = timeout.as_millis() as u64,
            "Awaiting reply"
        );

        let result = self
            .await_reply(correlation_id, message_type, receiver, timeout, options.cancel.as_ref())
            .await;
        guard.disarm();
        result
    }

    /// Wait for whichever of reply, timer and cancellation comes first.
    async fn await_reply(
        &self,
        correlation_id: CorrelationId,
        message_type: &str,
        mut receiver: ReplyReceiver,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<ReplyFrame> {
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let wake = tokio::select! {
            slot = &mut receiver => Wake::Reply(slot),
            _ = tokio::time::sleep(timeout) => Wake::Expired,
            _ = cancelled => Wake::Cancelled,
        };

        let expired = match wake {
            Wake::Reply(slot) => return settle(slot),
            Wake::Expired => true,
            Wake::Cancelled => false,
        };

        if self.registry.remove(&correlation_id) {
            if expired {
                warn!(
                    correlation_id = %correlation_id,
                    message_type = message_type,
                    timeout_ms = timeout.as_millis() as u64,
                    "Call timed out"
                );
                return Err(BridgeError::Timeout {
                    correlation_id,
                    message_type: message_type.to_string(),
                    timeout,
                });
            }
            debug!(correlation_id = %correlation_id, "Call cancelled by caller");
            return Err(BridgeError::Cancelled { correlation_id });
        }

        // Lost the removal: the winner has already filled the slot
        debug!(
            correlation_id = %correlation_id,
            "Reply won the race against the timer"
        );
        settle(receiver.await)
    }

    /// Call with a typed request and a typed reply.
    pub async fn call_typed<Req, Resp>(
        &self,
        destination: &str,
        message_type: &str,
        request: &Req,
    ) -> BridgeResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.call_typed_with(destination, message_type, request, CallOptions::default())
            .await
    }

    pub async fn call_typed_with<Req, Resp>(
        &self,
        destination: &str,
        message_type: &str,
        request: &Req,
        options: CallOptions,
    ) -> BridgeResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = encode_request(request)?;
        let reply = self
            .call_with(destination, message_type, payload, options)
            .await?;
        decode_reply(message_type, reply)
    }

    pub fn registry(&self) -> &Arc<PendingCallRegistry> {
        &self.registry
    }

    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

fn settle(slot: Result<ReplySlot, RecvError>) -> BridgeResult<ReplyFrame> {
    match slot {
        Ok(Ok(frame)) => Ok(frame),
        Ok(Err(transport)) => Err(BridgeError::Transport(transport)),
        Err(_) => Err(BridgeError::Transport(TransportError::ReplyDropped)),
    }
}

fn check_application_error(message_type: &str, frame: ReplyFrame) -> BridgeResult<MessageData> {
    match frame.application_error() {
        Some(message) => {
            debug!(
                correlation_id = %frame.correlation_id,
                message_type = message_type,
                error = %message,
                "Remote service reported an error"
            );
            Err(BridgeError::Application {
                message_type: message_type.to_string(),
                message,
                details: frame.payload.get(ERROR_FIELD).cloned().unwrap_or(Value::Null),
            })
        }
        None => Ok(frame.payload),
    }
}

/// Serialize a typed request into `message_data`. Requests must be objects.
pub fn encode_request<Req: Serialize + ?Sized>(request: &Req) -> BridgeResult<MessageData> {
    match serde_json::to_value(request) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(TransportError::Encode(format!(
            "request must be a JSON object, got {other}"
        ))
        .into()),
        Err(e) => Err(TransportError::Encode(e.to_string()).into()),
    }
}

/// Decode a reply's `message_data` into the shape the caller expects.
pub fn decode_reply<T: DeserializeOwned>(
    message_type: &str,
    reply: MessageData,
) -> BridgeResult<T> {
    serde_json::from_value(Value::Object(reply)).map_err(|e| BridgeError::Decode {
        message_type: message_type.to_string(),
        reason: e.to_string(),
    })
}
