//! # Error Types
//!
//! Errors raised while encoding or decoding provisioning bodies.

use thiserror::Error;

/// Payload (de)serialization failures.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// A request body could not be serialized.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// Type being encoded.
        what: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },

    /// A response body did not match the expected shape.
    #[error("failed to decode {what}: {source}")]
    Decode {
        /// Type being decoded.
        what: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}
