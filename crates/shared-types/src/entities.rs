//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Credentials**: `IssuedCredential` (the body of a successful
//!   create-keys-and-certificate call)
//! - **Registration**: `RegistrationOutcome`, `TemplateParameters`
//! - **Identity**: `DeviceIdentity`, the final result of a provisioning run

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: CREDENTIALS
// =============================================================================

/// Key pair and certificate issued to the device by the broker.
///
/// Deserialized directly from the accepted response of the
/// credential-issuance call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    /// Unique identifier of the issued certificate.
    pub certificate_id: String,
    /// Certificate in PEM form.
    pub certificate_pem: String,
    /// Private key in PEM form.
    pub private_key: String,
    /// Proof of possession presented during registration.
    pub certificate_ownership_token: String,
}

impl IssuedCredential {
    /// Short, log-safe prefix of the certificate id.
    #[must_use]
    pub fn short_id(&self) -> &str {
        let end = self
            .certificate_id
            .char_indices()
            .nth(12)
            .map_or(self.certificate_id.len(), |(idx, _)| idx);
        &self.certificate_id[..end]
    }
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("certificate_id", &self.certificate_id)
            .field("certificate_pem_len", &self.certificate_pem.len())
            .field("private_key", &"<redacted>")
            .field("certificate_ownership_token", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// CLUSTER B: REGISTRATION
// =============================================================================

/// Caller-supplied template parameters. Forwarded verbatim; never inspected.
pub type TemplateParameters = serde_json::Map<String, serde_json::Value>;

/// What the registrar assigned to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    /// Name of the thing (device) created or matched by the template.
    pub thing_name: String,
    /// Configuration the template attached to the device.
    #[serde(default)]
    pub device_configuration: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// CLUSTER C: IDENTITY
// =============================================================================

/// The permanent identity a device ends up with after provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    /// Thing name assigned by the registrar.
    pub thing_name: String,
    /// Certificate the device now authenticates with.
    pub certificate_id: String,
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (certificate {})", self.thing_name, self.certificate_id)
    }
}
