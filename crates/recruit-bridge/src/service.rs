//! Bridge service - owns the registry, the publisher worker and the
//! dispatcher loop, and hands out the facade and typed clients.

use crate::clients::ServiceClients;
use crate::dispatcher::{DispatcherSnapshot, InboundDispatcher};
use crate::domain::config::{BridgeConfig, ConfigError};
use crate::domain::error::TransportError;
use crate::facade::RpcBridge;
use crate::ports::{BrokerTransport, ReplySource};
use crate::publisher::{OutboundPublisher, PublisherSnapshot, PublisherWorker};
use crate::registry::{PendingCallRegistry, RegistrySnapshot};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Service lifecycle errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("bridge already started")]
    AlreadyStarted,
}

/// Combined counters of every bridge component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BridgeSnapshot {
    pub registry: RegistrySnapshot,
    pub publisher: PublisherSnapshot,
    pub dispatcher: DispatcherSnapshot,
}

/// Request/reply bridge service state
pub struct BridgeService {
    config: BridgeConfig,
    registry: Arc<PendingCallRegistry>,
    publisher: OutboundPublisher,
    dispatcher: Arc<InboundDispatcher>,
    bridge: RpcBridge,
    clients: ServiceClients,
    worker: Option<PublisherWorker>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeService {
    /// Create a new bridge service. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn BrokerTransport>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let registry = Arc::new(PendingCallRegistry::new());

        let (publisher, worker) = OutboundPublisher::channel(
            config.outbound_capacity,
            config.publish_timeout,
            transport,
            Arc::clone(&registry),
        );

        let dispatcher = Arc::new(InboundDispatcher::new(Arc::clone(&registry)));

        let bridge = RpcBridge::new(
            Arc::clone(&registry),
            publisher.clone(),
            config.reply_queue.as_str(),
            config.call_timeout,
        );

        let clients = ServiceClients::new(bridge.clone(), &config.queues);

        Ok(Self {
            config,
            registry,
            publisher,
            dispatcher,
            bridge,
            clients,
            worker: Some(worker),
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }

    /// Spawn the publisher worker and the dispatcher loop over `replies`.
    ///
    /// `replies` must be the one consumer of this service's reply queue.
    pub fn start<S>(&mut self, replies: S) -> Result<(), ServiceError>
    where
        S: ReplySource + 'static,
    {
        let worker = self.worker.take().ok_or(ServiceError::AlreadyStarted)?;

        info!(
            reply_queue = %self.config.reply_queue,
            call_timeout_ms = self.config.call_timeout.as_millis() as u64,
            outbound_capacity = self.config.outbound_capacity,
            "Starting request/reply bridge"
        );

        self.tasks.push(tokio::spawn(worker.run(self.shutdown.clone())));

        let dispatcher = Arc::clone(&self.dispatcher);
        let shutdown = self.shutdown.clone();
        self.tasks.push(tokio::spawn(async move {
            dispatcher.run(replies, shutdown).await;
        }));

        Ok(())
    }

    /// Stop both loops and fail every call still waiting.
    pub async fn shutdown(&mut self) {
        info!("Stopping request/reply bridge");
        self.shutdown.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "Bridge task ended abnormally");
            }
        }

        let failed = self.registry.fail_all(TransportError::PublisherClosed);
        if failed > 0 {
            warn!(failed = failed, "Failed calls still pending at shutdown");
        }

        info!("Request/reply bridge stopped");
    }

    /// Started, not shut down, and the reply queue is still open.
    pub fn is_running(&self) -> bool {
        self.worker.is_none()
            && !self.shutdown.is_cancelled()
            && self.registry.closed_reason().is_none()
    }

    pub fn bridge(&self) -> &RpcBridge {
        &self.bridge
    }

    pub fn clients(&self) -> &ServiceClients {
        &self.clients
    }

    pub fn registry(&self) -> Arc<PendingCallRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            registry: self.registry.snapshot(),
            publisher: self.publisher.stats().snapshot(),
            dispatcher: self.dispatcher.stats().snapshot(),
        }
    }
}
