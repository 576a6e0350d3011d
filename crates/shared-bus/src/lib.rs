//! # Shared Bus - In-Memory Queue Broker
//!
//! An AMQP-style broker used as the transport collaborator of the
//! recruitment bridge for local runs and tests.
//!
//! ## Model
//!
//! ```text
//! ┌──────────────┐  publish(queue, bytes)   ┌──────────────────┐
//! │   Producer   │ ───────────────────────→ │  Named Queue     │
//! └──────────────┘                          │  (bounded mpsc)  │
//!                                           └────────┬─────────┘
//!                                                    │ subscribe(queue)
//!                                                    ▼
//!                                           ┌──────────────────┐
//!                                           │ Single Consumer  │
//!                                           └──────────────────┘
//! ```
//!
//! - Queues are declared lazily and buffer messages until consumed.
//! - Each queue has at most one consumer (exclusive consumer semantics).
//! - A full queue makes `publish` wait; this is the broker's own backpressure.
//! - Connection management, acknowledgements and redelivery are out of scope.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod delivery;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use delivery::{BrokerError, Delivery};
pub use publisher::{InMemoryBroker, QueuePublisher};
pub use subscriber::{DeliveryStream, QueueSubscription};

/// Maximum messages buffered per queue before `publish` waits.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
