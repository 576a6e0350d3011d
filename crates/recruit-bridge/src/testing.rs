//! Test transports shared by the unit tests.

use crate::dispatcher::InboundDispatcher;
use crate::domain::envelope::WireMessage;
use crate::domain::error::TransportError;
use crate::facade::RpcBridge;
use crate::ports::BrokerTransport;
use crate::publisher::OutboundPublisher;
use crate::registry::PendingCallRegistry;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Accepts everything and forwards each decoded message to an optional tap.
#[derive(Default, Clone)]
pub struct RecordingTransport {
    tap: Option<mpsc::UnboundedSender<(String, WireMessage)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport plus a receiver seeing every published message.
    pub fn tapped() -> (Self, mpsc::UnboundedReceiver<(String, WireMessage)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tap: Some(tx) }, rx)
    }
}

#[async_trait]
impl BrokerTransport for RecordingTransport {
    async fn publish(&self, queue: &str, body: Bytes) -> Result<(), TransportError> {
        let wire = WireMessage::decode(&body).map_err(|e| TransportError::Encode(e.to_string()))?;
        if let Some(tap) = &self.tap {
            let _ = tap.send((queue.to_string(), wire));
        }
        Ok(())
    }
}

/// Refuses every message.
pub struct RejectingTransport;

#[async_trait]
impl BrokerTransport for RejectingTransport {
    async fn publish(&self, queue: &str, _body: Bytes) -> Result<(), TransportError> {
        Err(TransportError::Broker {
            queue: queue.to_string(),
            reason: "connection reset".into(),
        })
    }
}

/// Never finishes a publish, like a broker stuck on flow control.
pub struct StalledTransport;

#[async_trait]
impl BrokerTransport for StalledTransport {
    async fn publish(&self, _queue: &str, _body: Bytes) -> Result<(), TransportError> {
        std::future::pending().await
    }
}

/// Bridge whose requests are answered in-process by `respond`.
///
/// `respond` gets the destination queue and the request, and returns the
/// reply's `message_data`.
pub fn loopback<F>(respond: F) -> (RpcBridge, Arc<PendingCallRegistry>)
where
    F: Fn(&str, &WireMessage) -> Value + Send + 'static,
{
    let registry = Arc::new(PendingCallRegistry::new());
    let (transport, mut requests) = RecordingTransport::tapped();
    let (publisher, worker) = OutboundPublisher::channel(
        64,
        Duration::from_secs(1),
        Arc::new(transport),
        Arc::clone(&registry),
    );
    tokio::spawn(worker.run(CancellationToken::new()));

    let dispatcher = InboundDispatcher::new(Arc::clone(&registry));
    tokio::spawn(async move {
        while let Some((queue, request)) = requests.recv().await {
            let reply = json!({
                "id": request.id,
                "message_type": request.message_type,
                "message_data": respond(&queue, &request),
            });
            dispatcher.dispatch(reply.to_string().as_bytes());
        }
    });

    let bridge = RpcBridge::new(
        Arc::clone(&registry),
        publisher,
        "recruitment.reply",
        Duration::from_secs(5),
    );
    (bridge, registry)
}
