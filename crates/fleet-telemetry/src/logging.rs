//! Structured logging setup.
//!
//! Every record carries consistent fields so log pipelines can parse them:
//! - `operation`: logical call (IssueCredentials, RegisterDevice)
//! - `call_id`: correlation id of the in-flight call
//! - `phase`: session phase at the time of the event
//! - `topic`: broker topic, for delivery events

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Handle proving the global subscriber was installed.
#[derive(Debug)]
pub struct LoggingHandle {
    json: bool,
}

impl LoggingHandle {
    /// Whether records are emitted as JSON.
    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Install the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from the configured
/// level. Fails if a global subscriber is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingHandle, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    if !config.console_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else if config.json_logs {
        // JSON output for containers/production
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        // Pretty output for development
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging initialized"
    );

    Ok(LoggingHandle {
        json: config.json_logs,
    })
}

/// Log a call-scoped event with the standard fields.
///
/// ```rust,ignore
/// log_call_event!(info, "Request published", "RegisterDevice", call_id, topic = %topic);
/// ```
#[macro_export]
macro_rules! log_call_event {
    ($level:ident, $msg:expr, $operation:expr, $call_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            operation = %$operation,
            call_id = %$call_id,
            $($($field)*,)?
            $msg
        )
    };
}
