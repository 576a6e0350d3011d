//! Domain types for the bridge.
//!
//! Correlation IDs, the envelope/reply wire form, configuration and the
//! error taxonomy. No I/O lives here.

pub mod config;
pub mod correlation;
pub mod envelope;
pub mod error;

// Re-exports for convenience
pub use config::{BridgeConfig, ConfigError, ServiceQueues, DEFAULT_CALL_TIMEOUT};
pub use correlation::CorrelationId;
pub use envelope::{CodecError, Envelope, MessageData, ReplyFrame, WireMessage, ERROR_FIELD};
pub use error::{BridgeError, BridgeResult, DuplicateCorrelation, TransportError};
