//! # Topic Registry
//!
//! Maps a logical operation to its request topic and the pair of outcome
//! topics. Issuance topics are fixed; registration topics embed the fleet
//! template name.

use crate::domain::errors::TopicError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request topic for credential issuance.
pub const CREATE_CERTIFICATE_TOPIC: &str = "$aws/certificates/create/json";

/// Prefix of the per-template registration topics.
pub const PROVISIONING_TEMPLATES_PREFIX: &str = "$aws/provisioning-templates";

/// Suffix appended to a request topic for the success reply.
pub const ACCEPTED_SUFFIX: &str = "/accepted";

/// Suffix appended to a request topic for the failure reply.
pub const REJECTED_SUFFIX: &str = "/rejected";

/// The logical calls of a provisioning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Obtain a fresh key pair and certificate.
    IssueCredentials,
    /// Register the device against a fleet template.
    RegisterDevice,
}

impl Operation {
    /// Stable name used in logs and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IssueCredentials => "IssueCredentials",
            Self::RegisterDevice => "RegisterDevice",
        }
    }

    /// Whether the topics depend on the template name.
    #[must_use]
    pub fn is_template_scoped(&self) -> bool {
        matches!(self, Self::RegisterDevice)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request topic plus the two outcome topics of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTopics {
    /// Where the request is published.
    pub request: String,
    /// Success replies.
    pub accepted: String,
    /// Failure replies.
    pub rejected: String,
}

impl OperationTopics {
    fn from_request(request: String) -> Self {
        Self {
            accepted: format!("{request}{ACCEPTED_SUFFIX}"),
            rejected: format!("{request}{REJECTED_SUFFIX}"),
            request,
        }
    }
}

/// Look up the topics for an operation.
///
/// Fails only when a template-scoped operation gets an empty template name.
/// Template names containing topic separators or wildcards are rejected too,
/// as they would address a different topic.
pub fn topics_for(operation: Operation, template_name: &str) -> Result<OperationTopics, TopicError> {
    if operation.is_template_scoped() {
        validate_template_name(template_name)?;
    }
    let request = match operation {
        Operation::IssueCredentials => CREATE_CERTIFICATE_TOPIC.to_string(),
        Operation::RegisterDevice => {
            format!("{PROVISIONING_TEMPLATES_PREFIX}/{template_name}/provision/json")
        }
    };
    Ok(OperationTopics::from_request(request))
}

/// Check that a template name can be embedded in a topic.
pub fn validate_template_name(template_name: &str) -> Result<(), TopicError> {
    if template_name.is_empty() {
        return Err(TopicError::EmptyTemplateName);
    }
    if template_name.contains(['/', '+', '#']) {
        return Err(TopicError::InvalidTemplateName(template_name.to_string()));
    }
    Ok(())
}
