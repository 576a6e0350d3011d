//! # Recruit Node Library
//!
//! Exposes the node runtime pieces so the binary and the tests share them.
//!
//! - `config` - bridge configuration from file and environment
//! - `responders` - loopback stand-ins for the sibling services
//! - `runtime` - broker, bridge service and responders wired together

pub mod config;
pub mod responders;
pub mod runtime;

pub use config::load_bridge_config;
pub use responders::{Directory, LoopbackSiblings};
pub use runtime::{LookupTarget, NodeOptions, NodeRuntime};
