//! Ports between the bridge and the broker.
//!
//! The bridge never talks to a broker client directly. Outbound envelopes go
//! through [`BrokerTransport`] and inbound reply bodies arrive through
//! [`ReplySource`], so tests and the in-memory broker plug in the same way a
//! real AMQP connection would.

pub mod inbound;
pub mod outbound;

pub use inbound::ReplySource;
pub use outbound::BrokerTransport;
