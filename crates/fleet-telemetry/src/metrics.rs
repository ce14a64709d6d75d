//! Prometheus metrics for the provisioning core.
//!
//! All metrics follow the naming convention: `fp_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: calls started, responses received, duplicates, timeouts
//! - **Histogram**: time from request publish to resolution

use lazy_static::lazy_static;
use prometheus::{exponential_buckets, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts};
use prometheus::{Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CALL METRICS
    // =========================================================================

    /// Requests published, by operation
    pub static ref CALLS_STARTED: CounterVec = CounterVec::new(
        Opts::new("fp_calls_started_total", "Provisioning requests published"),
        &["operation"]
    ).expect("metric creation failed");

    /// Responses that resolved a call
    pub static ref RESPONSES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("fp_responses_received_total", "Responses that resolved a pending call"),
        &["operation", "outcome"]  // outcome: accepted/rejected
    ).expect("metric creation failed");

    /// Responses dropped because the call was already resolved
    pub static ref DUPLICATE_RESPONSES: CounterVec = CounterVec::new(
        Opts::new("fp_duplicate_responses_total", "Responses for an already resolved call"),
        &["operation"]
    ).expect("metric creation failed");

    /// Responses with no call in flight
    pub static ref UNSOLICITED_RESPONSES: CounterVec = CounterVec::new(
        Opts::new("fp_unsolicited_responses_total", "Responses with no call in flight"),
        &["operation"]
    ).expect("metric creation failed");

    /// Calls that hit the wait bound
    pub static ref CALL_TIMEOUTS: CounterVec = CounterVec::new(
        Opts::new("fp_call_timeouts_total", "Calls that received no response in time"),
        &["operation"]
    ).expect("metric creation failed");

    /// Publish-to-resolution latency
    pub static ref CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "fp_call_duration_seconds",
            "Time from request publish to resolution"
        ).buckets(exponential_buckets(0.001, 2.0, 15).expect("bucket layout is valid")),
        &["operation"]
    ).expect("metric creation failed");

    // =========================================================================
    // SESSION METRICS
    // =========================================================================

    /// Phase transitions, by target phase
    pub static ref PHASE_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("fp_phase_transitions_total", "Session phase transitions"),
        &["phase"]
    ).expect("metric creation failed");

    /// Finished sessions
    pub static ref SESSIONS: CounterVec = CounterVec::new(
        Opts::new("fp_sessions_total", "Finished provisioning sessions"),
        &["outcome"]  // outcome: provisioned/failed
    ).expect("metric creation failed");
}

/// Handle to the registry the metrics were registered in.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    /// Render the registry in the Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        encode_registry(&self.registry)
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics already present are left as they are.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Calls
        Box::new(CALLS_STARTED.clone()),
        Box::new(RESPONSES_RECEIVED.clone()),
        Box::new(DUPLICATE_RESPONSES.clone()),
        Box::new(UNSOLICITED_RESPONSES.clone()),
        Box::new(CALL_TIMEOUTS.clone()),
        Box::new(CALL_DURATION.clone()),
        // Sessions
        Box::new(PHASE_TRANSITIONS.clone()),
        Box::new(SESSIONS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    encode_registry(&REGISTRY)
}

fn encode_registry(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
