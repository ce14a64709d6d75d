//! # Request and Rejection Bodies
//!
//! JSON bodies published on the provisioning request topics, and the view
//! over rejection bodies returned on `.../rejected`.

use crate::entities::TemplateParameters;
use crate::errors::PayloadError;
use serde::{Deserialize, Serialize};

/// Body of the credential-issuance request. Serializes to `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateKeysAndCertificateRequest {}

/// Body of the device registration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterThingRequest {
    /// Ownership proof returned by credential issuance.
    pub certificate_ownership_token: String,
    /// Template parameters, passed through untouched.
    #[serde(default)]
    pub parameters: TemplateParameters,
}

/// Read-only view of a rejection body.
///
/// All fields are optional: the broker's rejection shape is not a contract,
/// and the raw payload is what gets propagated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionBody {
    /// HTTP-like status code.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Machine-readable error code.
    #[serde(default)]
    pub error_code: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RejectionBody {
    /// Best-effort view over an opaque rejection payload.
    #[must_use]
    pub fn view(payload: &serde_json::Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }
}

/// Encode a request body to bytes for publishing.
pub fn encode_body<T: Serialize>(body: &T) -> Result<Vec<u8>, PayloadError> {
    serde_json::to_vec(body).map_err(|source| PayloadError::Encode {
        what: std::any::type_name::<T>(),
        source,
    })
}

/// Decode a typed body out of a JSON value received on an accepted topic.
pub fn decode_body<T: for<'de> Deserialize<'de>>(
    payload: &serde_json::Value,
) -> Result<T, PayloadError> {
    serde_json::from_value(payload.clone()).map_err(|source| PayloadError::Decode {
        what: std::any::type_name::<T>(),
        source,
    })
}
