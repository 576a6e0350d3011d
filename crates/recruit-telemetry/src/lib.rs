//! # Recruit Telemetry
//!
//! Observability for the recruitment bridge.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an env-filtered `fmt` layer, human or JSON
//! - **Metrics**: Prometheus counters and gauges for calls, pending entries
//!   and dispatcher drops
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recruit_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RECRUIT_SERVICE_NAME` | `recruit` | Service name in log lines |
//! | `RECRUIT_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `RECRUIT_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, BRIDGE_CALLS, BRIDGE_CALL_DURATION,
    DISPATCHER_FRAMES, PENDING_CALLS, PUBLISH_FAILURES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so early log lines can already count
    let metrics = register_metrics()?;

    init_logging(config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
