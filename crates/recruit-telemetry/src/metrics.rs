//! Prometheus metrics for the recruitment bridge.
//!
//! All metrics follow the naming convention: `recruit_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., bridge_calls_total)
//! - **Gauge**: Value that can go up or down (e.g., bridge_pending_calls)
//! - **Histogram**: Distribution of values (e.g., bridge_call_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CALL FACADE
    // =========================================================================

    /// Calls by message type and outcome
    pub static ref BRIDGE_CALLS: CounterVec = CounterVec::new(
        Opts::new("recruit_bridge_calls_total", "Total request/reply calls"),
        &["message_type", "outcome"]  // outcome: resolved/timeout/transport/application/cancelled
    ).expect("metric creation failed");

    /// Call latency from register to outcome
    pub static ref BRIDGE_CALL_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "recruit_bridge_call_duration_seconds",
            "Time from publish to reply or failure"
        ).buckets(exponential_buckets(0.001, 2.0, 18).expect("bucket layout"))
    ).expect("metric creation failed");

    // =========================================================================
    // REGISTRY
    // =========================================================================

    /// Calls currently waiting for a reply
    pub static ref PENDING_CALLS: Gauge = Gauge::new(
        "recruit_bridge_pending_calls",
        "Number of registered calls awaiting a reply"
    ).expect("metric creation failed");

    // =========================================================================
    // PUBLISHER / DISPATCHER
    // =========================================================================

    /// Envelopes the broker refused
    pub static ref PUBLISH_FAILURES: Counter = Counter::new(
        "recruit_publisher_failures_total",
        "Envelopes that could not be handed to the broker"
    ).expect("metric creation failed");

    /// Inbound frames by dispatch outcome
    pub static ref DISPATCHER_FRAMES: CounterVec = CounterVec::new(
        Opts::new("recruit_dispatcher_frames_total", "Reply frames seen by the dispatcher"),
        &["outcome"]  // outcome: delivered/unmatched/malformed
    ).expect("metric creation failed");
}

/// Handle to the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all bridge metrics with the global registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BRIDGE_CALLS.clone()),
        Box::new(BRIDGE_CALL_DURATION.clone()),
        Box::new(PENDING_CALLS.clone()),
        Box::new(PUBLISH_FAILURES.clone()),
        Box::new(DISPATCHER_FRAMES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
