//! # Domain Errors
//!
//! Error types for the provisioning core.

use crate::domain::session::Phase;
use crate::domain::topics::Operation;
use shared_bus::GatewayError;
use std::time::Duration;
use thiserror::Error;

/// Topic lookup errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// Template-scoped operation without a template.
    #[error("template name must not be empty")]
    EmptyTemplateName,

    /// Template name that would change the topic structure.
    #[error("template name contains topic separators or wildcards: {0}")]
    InvalidTemplateName(String),
}

/// Provisioning error types.
///
/// Every variant is fatal to the current session; only [`Timeout`] is
/// worth a fresh attempt.
///
/// [`Timeout`]: ProvisioningError::Timeout
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProvisioningError {
    /// The broker answered on the rejected topic. Payload is verbatim.
    #[error("{operation} rejected: {payload}")]
    ProtocolRejected {
        /// Call that was rejected
        operation: Operation,
        /// Body received on `.../rejected`
        payload: serde_json::Value,
    },

    /// No reply within the wait bound.
    #[error("{operation} timed out after {attempts} attempts ({waited:?})")]
    Timeout {
        /// Call that went unanswered
        operation: Operation,
        /// Poll intervals waited
        attempts: u32,
        /// Total time waited
        waited: Duration,
    },

    /// Step invoked before its precondition holds.
    #[error("illegal in phase {phase}: {reason}")]
    IllegalState {
        /// Phase the session was in
        phase: Phase,
        /// What was missing
        reason: String,
    },

    /// Connect, reconnect, subscribe or publish failed at the gateway.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] GatewayError),

    /// An accepted reply did not have the expected shape.
    #[error("malformed {operation} response: {reason}")]
    MalformedResponse {
        /// Call whose reply was malformed
        operation: Operation,
        /// Decoder message
        reason: String,
    },

    /// Writing the issued key or certificate failed.
    #[error("credential persistence failed: {0}")]
    CredentialPersistence(String),

    /// Template name unusable in a topic.
    #[error("invalid template: {0}")]
    InvalidTemplate(#[from] TopicError),
}

impl ProvisioningError {
    /// Whether the caller may start a new session and expect a different
    /// result.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short label for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProtocolRejected { .. } => "protocol_rejected",
            Self::Timeout { .. } => "timeout",
            Self::IllegalState { .. } => "illegal_state",
            Self::TransportFailure(_) => "transport_failure",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::CredentialPersistence(_) => "credential_persistence",
            Self::InvalidTemplate(_) => "invalid_template",
        }
    }
}
