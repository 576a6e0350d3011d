//! Adapters binding the bridge ports to concrete brokers.

pub mod shared_bus;

pub use shared_bus::SharedBusTransport;
