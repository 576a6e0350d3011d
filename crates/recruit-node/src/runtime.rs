//! Node runtime: broker, bridge service and loopback siblings.

use crate::responders::{Directory, LoopbackSiblings};
use anyhow::{Context, Result};
use recruit_bridge::{BridgeConfig, BridgeService, BridgeSnapshot, SharedBusTransport};
use serde_json::Value;
use shared_bus::InMemoryBroker;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runtime knobs that are not bridge configuration.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    /// Per-queue capacity of the in-memory broker
    pub broker_capacity: usize,
    /// Run stand-in sibling services on the broker
    pub loopback: bool,
    /// Upper bound of the simulated sibling latency
    pub max_latency: Duration,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            broker_capacity: shared_bus::DEFAULT_QUEUE_CAPACITY,
            loopback: true,
            max_latency: Duration::from_millis(25),
        }
    }
}

/// What a `lookup` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LookupTarget {
    Employee,
    Organization,
    Location,
    Job,
    User,
    /// The user account linked to an employee ID
    UserByEmployee,
    Grade,
}

/// The running node.
pub struct NodeRuntime {
    config: BridgeConfig,
    options: NodeOptions,
    broker: Arc<InMemoryBroker>,
    service: BridgeService,
    siblings: Option<LoopbackSiblings>,
    shutdown: CancellationToken,
}

impl NodeRuntime {
    pub fn new(config: BridgeConfig, options: NodeOptions) -> Result<Self> {
        let broker = Arc::new(InMemoryBroker::with_capacity(options.broker_capacity));
        let transport = Arc::new(SharedBusTransport::new(broker.clone()));
        let service = BridgeService::new(config.clone(), transport)
            .context("Failed to create bridge service")?;

        Ok(Self {
            config,
            options,
            broker,
            service,
            siblings: None,
            shutdown: CancellationToken::new(),
        })
    }

    /// Claim the reply queue, start the bridge and, if enabled, the siblings.
    pub fn start(&mut self) -> Result<()> {
        info!("===========================================");
        info!("  Recruit Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let replies = self
            .broker
            .subscribe(&self.config.reply_queue)
            .with_context(|| format!("Failed to consume reply queue {}", self.config.reply_queue))?;

        if self.options.loopback {
            self.siblings = Some(LoopbackSiblings::spawn(
                Arc::clone(&self.broker),
                &self.config.queues,
                Arc::new(Directory::sample()),
                self.options.max_latency,
                self.shutdown.clone(),
            )?);
        }

        self.service.start(replies).context("Failed to start bridge")?;

        info!(
            reply_queue = %self.config.reply_queue,
            loopback = self.options.loopback,
            "Node started"
        );
        Ok(())
    }

    /// Run one typed lookup and render the result as JSON.
    pub async fn lookup(&self, target: LookupTarget, id: &str) -> Result<Value> {
        let clients = self.service.clients();
        let value = match target {
            LookupTarget::Employee => serde_json::to_value(clients.employee.find_by_id(id).await?)?,
            LookupTarget::Organization => {
                serde_json::to_value(clients.organization.find_by_id(id).await?)?
            }
            LookupTarget::Location => {
                serde_json::to_value(clients.organization.find_location_by_id(id).await?)?
            }
            LookupTarget::Job => serde_json::to_value(clients.job.find_by_id(id).await?)?,
            LookupTarget::User => serde_json::to_value(clients.user.find_by_id(id).await?)?,
            LookupTarget::UserByEmployee => {
                serde_json::to_value(clients.user.find_by_employee_id(id).await?)?
            }
            LookupTarget::Grade => serde_json::to_value(clients.grade.find_by_id(id).await?)?,
        };
        Ok(value)
    }

    pub fn service(&self) -> &BridgeService {
        &self.service
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        self.service.snapshot()
    }

    /// Stop the bridge first so waiting calls fail, then the siblings.
    pub async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");
        self.service.shutdown().await;

        self.shutdown.cancel();
        if let Some(siblings) = self.siblings.take() {
            siblings.join().await;
        }
        self.broker.close();

        info!("Shutdown complete");
    }
}
