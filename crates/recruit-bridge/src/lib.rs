//! Recruit Bridge - request/reply correlation over a message broker.
//!
//! Sibling services (employee, organization, job, user, grade, mail) are
//! reached only through broker queues. This crate makes each lookup look
//! like one awaited call.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          RECRUIT BRIDGE                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  Integration clients (employee, organization, job, user, grade, mail)│
//! │                               │                                      │
//! │                    ┌──────────┴──────────┐                           │
//! │                    │  RpcBridge (facade) │ register → publish → wait │
//! │                    └──┬───────────────┬──┘                           │
//! │          register/remove│             │publish                       │
//! │        ┌────────────────┴───┐   ┌─────┴──────────────┐               │
//! │        │ PendingCallRegistry│◄──│ OutboundPublisher  │ bounded queue │
//! │        │  (DashMap+oneshot) │fail│ + PublisherWorker │               │
//! │        └────────▲───────────┘   └─────┬──────────────┘               │
//! │          resolve│                     │                              │
//! │        ┌────────┴───────────┐         │                              │
//! │        │ InboundDispatcher  │         │                              │
//! │        └────────▲───────────┘         │                              │
//! └─────────────────┼─────────────────────┼──────────────────────────────┘
//!          ReplySource port        BrokerTransport port
//!                   │                     │
//!            reply queue ◄── broker ◄── destination queues
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use recruit_bridge::{BridgeConfig, BridgeService, SharedBusTransport};
//!
//! let broker = Arc::new(InMemoryBroker::new());
//! let config = BridgeConfig::from_env()?;
//! let replies = broker.subscribe(&config.reply_queue)?;
//! let mut service = BridgeService::new(config, Arc::new(SharedBusTransport::new(broker)))?;
//! service.start(replies)?;
//!
//! let employee = service.clients().employee.find_by_id("e-1").await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod clients;
pub mod dispatcher;
pub mod domain;
pub mod facade;
pub mod ports;
pub mod publisher;
pub mod registry;
pub mod service;

#[cfg(test)]
mod testing;

pub use adapters::SharedBusTransport;
pub use clients::ServiceClients;
pub use dispatcher::{DispatchOutcome, DispatcherSnapshot, InboundDispatcher};
pub use domain::{
    BridgeConfig, BridgeError, BridgeResult, CodecError, ConfigError, CorrelationId, Envelope,
    MessageData, ReplyFrame, ServiceQueues, TransportError, WireMessage,
};
pub use facade::{decode_reply, encode_request, CallOptions, RpcBridge};
pub use ports::{BrokerTransport, ReplySource};
pub use publisher::{OutboundPublisher, PublisherSnapshot, PublisherWorker};
pub use registry::{PendingCallRegistry, RegistrySnapshot};
pub use service::{BridgeService, BridgeSnapshot, ServiceError};
