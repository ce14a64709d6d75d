//! # Outbound Ports
//!
//! Traits for external dependencies the core drives besides the messaging
//! gateway.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::IssuedCredential;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Where an issued credential was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedCredential {
    /// Certificate file.
    pub certificate_path: PathBuf,
    /// Private key file.
    pub private_key_path: PathBuf,
}

/// Credential persistence errors.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Credential cannot be stored as given.
    #[error("credential rejected: {0}")]
    Invalid(String),

    /// The blocking write task did not complete.
    #[error("persist task failed: {0}")]
    Task(String),
}

/// Credential persister - outbound port.
///
/// Stores the key and certificate so the gateway can be reconfigured to use
/// them.
#[async_trait]
pub trait CredentialPersister: Send + Sync {
    /// Write the credential and return the file locations.
    async fn persist(&self, credential: &IssuedCredential)
        -> Result<PersistedCredential, PersistError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock persister for testing. Records certificate ids, writes nothing.
#[derive(Clone, Default)]
pub struct MockCredentialPersister {
    /// Should return errors?
    pub should_fail: bool,
    /// Certificate ids persisted so far.
    pub persisted: Arc<Mutex<Vec<String>>>,
}

impl MockCredentialPersister {
    /// Persister that always fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Certificate ids persisted so far.
    pub fn persisted_ids(&self) -> Vec<String> {
        self.persisted.lock().clone()
    }
}

#[async_trait]
impl CredentialPersister for MockCredentialPersister {
    async fn persist(
        &self,
        credential: &IssuedCredential,
    ) -> Result<PersistedCredential, PersistError> {
        if self.should_fail {
            return Err(PersistError::Invalid("Mock failure".to_string()));
        }

        self.persisted
            .lock()
            .push(credential.certificate_id.clone());

        Ok(PersistedCredential {
            certificate_path: PathBuf::from(format!(
                "{}-certificate.pem.crt",
                credential.certificate_id
            )),
            private_key_path: PathBuf::from(format!(
                "{}-private.pem.key",
                credential.certificate_id
            )),
        })
    }
}
