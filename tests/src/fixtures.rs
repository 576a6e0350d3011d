//! Test harness: an in-memory broker, a running bridge service and scripted
//! sibling services.

use bytes::Bytes;
use recruit_bridge::{
    BridgeConfig, BridgeService, BridgeSnapshot, MessageData, RpcBridge, SharedBusTransport,
    WireMessage,
};
use serde_json::Value;
use shared_bus::{InMemoryBroker, QueuePublisher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How a scripted sibling treats one request.
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply with `data` after `delay`
    Reply { data: Value, delay: Duration },
    /// Reply twice with the same ID
    Duplicate { data: Value, delay: Duration },
    /// Never reply
    Silent,
}

impl Script {
    pub fn reply(data: Value) -> Self {
        Script::Reply {
            data,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(data: Value, delay: Duration) -> Self {
        Script::Reply { data, delay }
    }
}

/// Convert a JSON object literal into `message_data`.
pub fn data(value: Value) -> MessageData {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Broker plus a started bridge service.
pub struct Harness {
    pub broker: Arc<InMemoryBroker>,
    pub service: BridgeService,
    pub config: BridgeConfig,
    siblings: CancellationToken,
}

impl Harness {
    pub fn start(config: BridgeConfig) -> Self {
        Self::start_with_broker(config, Arc::new(InMemoryBroker::new()))
    }

    pub fn start_with_broker(config: BridgeConfig, broker: Arc<InMemoryBroker>) -> Self {
        let replies = broker
            .subscribe(&config.reply_queue)
            .expect("reply queue should be free");
        let mut service = BridgeService::new(
            config.clone(),
            Arc::new(SharedBusTransport::new(broker.clone())),
        )
        .expect("test config should be valid");
        service.start(replies).expect("service starts once");

        Self {
            broker,
            service,
            config,
            siblings: CancellationToken::new(),
        }
    }

    /// Config with a short call timeout.
    pub fn config_with_timeout(timeout: Duration) -> BridgeConfig {
        BridgeConfig {
            call_timeout: timeout,
            ..Default::default()
        }
    }

    pub fn bridge(&self) -> &RpcBridge {
        self.service.bridge()
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        self.service.snapshot()
    }

    /// Serve `queue` with `script`. Each request is handled on its own task,
    /// so delayed replies overtake each other.
    ///
    /// Returns a receiver of every request the sibling saw.
    pub fn sibling<F>(&self, queue: &str, script: F) -> mpsc::UnboundedReceiver<WireMessage>
    where
        F: Fn(&WireMessage) -> Script + Send + Sync + 'static,
    {
        let mut requests = self
            .broker
            .subscribe(queue)
            .expect("sibling queue should be free");
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let broker = Arc::clone(&self.broker);
        let shutdown = self.siblings.clone();
        let script = Arc::new(script);

        tokio::spawn(async move {
            loop {
                let delivery = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = requests.recv() => match next {
                        Some(delivery) => delivery,
                        None => break,
                    },
                };
                let Ok(request) = WireMessage::decode(delivery.body()) else {
                    continue;
                };
                let _ = seen_tx.send(request.clone());

                let broker = Arc::clone(&broker);
                let script = Arc::clone(&script);
                tokio::spawn(async move {
                    let (payload, delay, copies) = match script(&request) {
                        Script::Reply { data, delay } => (data, delay, 1),
                        Script::Duplicate { data, delay } => (data, delay, 2),
                        Script::Silent => return,
                    };
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let reply_to = request.reply_to.clone().unwrap_or_default();
                    for _ in 0..copies {
                        send_reply(
                            &broker,
                            &reply_to,
                            &request.id,
                            &request.message_type,
                            payload.clone(),
                        )
                        .await;
                    }
                });
            }
        });

        seen_rx
    }

    /// Put a raw frame on this service's reply queue.
    pub async fn inject_reply(&self, id: &str, message_type: &str, payload: Value) {
        send_reply(&self.broker, &self.config.reply_queue, id, message_type, payload).await;
    }

    pub async fn inject_raw(&self, body: &'static [u8]) {
        self.broker
            .publish(&self.config.reply_queue, Bytes::from_static(body))
            .await
            .expect("reply queue accepts frames");
    }

    /// Wait until the dispatcher has seen `count` frames in total.
    pub async fn wait_for_frames(&self, count: u64, within: Duration) {
        tokio::time::timeout(within, async {
            while self.snapshot().dispatcher.received < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("dispatcher did not see the expected frames in time");
    }

    pub async fn stop(mut self) {
        self.service.shutdown().await;
        self.siblings.cancel();
    }
}

async fn send_reply(
    broker: &InMemoryBroker,
    queue: &str,
    id: &str,
    message_type: &str,
    payload: Value,
) {
    let reply = WireMessage {
        id: id.to_string(),
        message_type: message_type.to_string(),
        message_data: match payload {
            Value::Object(map) => map,
            _ => MessageData::new(),
        },
        reply_to: None,
    };
    let body = reply.encode().expect("reply encodes");
    // The bridge may already have stopped; late replies are allowed to fail
    let _ = broker.publish(queue, body).await;
}
