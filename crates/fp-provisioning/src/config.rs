//! # Provisioning Configuration
//!
//! Explicit configuration record passed into session construction.

use crate::application::waiter::WaitPolicy;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Placeholder replaced with the assigned thing name in `liveness_topic`.
pub const THING_NAME_PLACEHOLDER: &str = "{thing_name}";

/// Default topic the device publishes on after reconnecting.
pub const DEFAULT_LIVENESS_TOPIC: &str = "devices/{thing_name}/liveness";

/// Which steps make up a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowMode {
    /// Issue, register, done.
    Minimal,
    /// Issue, register, swap credential and reconnect.
    #[default]
    Extended,
}

/// Invalid configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Zero poll interval.
    #[error("poll interval must be non-zero")]
    ZeroPollInterval,

    /// Zero attempts.
    #[error("max attempts must be at least 1")]
    ZeroAttempts,

    /// Liveness topic missing or malformed.
    #[error("invalid liveness topic: {0}")]
    LivenessTopic(String),
}

/// Provisioning core configuration.
#[derive(Clone, Debug)]
pub struct ProvisioningConfig {
    /// Bound on each request/response wait.
    pub wait: WaitPolicy,

    /// Minimal or extended flow.
    pub flow: FlowMode,

    /// Root CA presented when reconnecting with the issued credential.
    pub root_ca_path: PathBuf,

    /// Topic published after reconnecting; `{thing_name}` is substituted.
    pub liveness_topic: String,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            flow: FlowMode::Extended,
            root_ca_path: PathBuf::from("root-CA.crt"),
            liveness_topic: DEFAULT_LIVENESS_TOPIC.to_string(),
        }
    }
}

impl ProvisioningConfig {
    /// Create a config for testing (short waits).
    pub fn for_testing() -> Self {
        Self {
            wait: WaitPolicy::new(Duration::from_millis(10), 5),
            ..Self::default()
        }
    }

    /// Same config with the minimal flow.
    pub fn minimal(mut self) -> Self {
        self.flow = FlowMode::Minimal;
        self
    }

    /// Check the configuration before a session uses it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.wait.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.liveness_topic.is_empty()
            || self.liveness_topic.contains('+')
            || self.liveness_topic.contains('#')
        {
            return Err(ConfigError::LivenessTopic(self.liveness_topic.clone()));
        }
        Ok(())
    }

    /// Liveness topic for a thing.
    pub fn liveness_topic_for(&self, thing_name: &str) -> String {
        self.liveness_topic
            .replace(THING_NAME_PLACEHOLDER, thing_name)
    }
}
