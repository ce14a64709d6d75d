//! # Inbound Ports
//!
//! API trait defining what the provisioning core can do.

use crate::domain::{Phase, ProvisioningError};
use async_trait::async_trait;
use shared_types::{DeviceIdentity, TemplateParameters};

/// Final result of a provisioning session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The device has its permanent identity.
    Provisioned(DeviceIdentity),
    /// The session stopped at a failed step.
    Failed(ProvisioningError),
}

impl SessionOutcome {
    /// Whether the device ended up provisioned.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        matches!(self, Self::Provisioned(_))
    }

    /// Label for metrics and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Provisioned(_) => "provisioned",
            Self::Failed(_) => "failed",
        }
    }
}

/// Provisioning API - inbound port.
///
/// Steps are strictly sequential; every failing step moves the session to
/// `Failed` and returns the error.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Start a fresh session in `Idle`, replacing any previous one.
    fn start_session(
        &mut self,
        template_name: &str,
        template_parameters: TemplateParameters,
    ) -> Result<(), ProvisioningError>;

    /// Request a new key pair and certificate.
    async fn issue_credentials(&mut self) -> Result<(), ProvisioningError>;

    /// Register the device with the issued credential.
    async fn register_device(&mut self) -> Result<(), ProvisioningError>;

    /// Persist the credential, reconnect with it and publish liveness.
    async fn swap_credential(&mut self) -> Result<DeviceIdentity, ProvisioningError>;

    /// Finish a minimal-flow session right after registration.
    fn complete_without_swap(&mut self) -> Result<DeviceIdentity, ProvisioningError>;

    /// Run every step of a new session, as the configured flow requires.
    async fn run_provisioning_session(
        &mut self,
        template_name: &str,
        template_parameters: TemplateParameters,
    ) -> SessionOutcome;

    /// Current phase (`Idle` when no session was started).
    fn current_phase(&self) -> Phase;

    /// Whether the session reached its final phase.
    fn is_done(&self) -> bool;
}
