//! # Fleet Telemetry
//!
//! Logging and metrics for the fleet provisioning core.
//!
//! ## Components
//!
//! - **Logs**: `tracing` subscriber with an `EnvFilter` and a JSON or pretty
//!   console layer
//! - **Metrics**: Prometheus counters and histograms in a crate-global
//!   registry, rendered in the text exposition format
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleet_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FP_SERVICE_NAME` | `fleet-provision` | Service name in logs |
//! | `FP_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honored) |
//! | `FP_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `FP_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `FP_METRICS_ENABLED` | `true` | Register Prometheus metrics |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::{parse_flag, TelemetryConfig};
pub use logging::{init_logging, LoggingHandle};
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, CALLS_STARTED,
    CALL_DURATION, CALL_TIMEOUTS, DUPLICATE_RESPONSES, PHASE_TRANSITIONS, RESPONSES_RECEIVED,
    SESSIONS, UNSOLICITED_RESPONSES,
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

/// Initialize logging and, when enabled, metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so that startup events are already counted
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let logging = init_logging(config)?;

    Ok(TelemetryGuard {
        _logging: logging,
        metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingHandle,
    metrics: Option<MetricsHandle>,
}

impl TelemetryGuard {
    /// Metrics handle, if metrics were enabled.
    pub fn metrics(&self) -> Option<&MetricsHandle> {
        self.metrics.as_ref()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}

/// Increment a counter, optionally selecting a labelled series.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
