//! # Provisioning Session
//!
//! The overarching attempt for one device, and the phase ordering that
//! governs it.
//!
//! ```text
//! Idle -> AwaitingCredentialIssuance -> CredentialsIssued -> AwaitingRegistration
//!      -> Registered -> SwappingCredential -> Provisioned
//!
//! any non-terminal phase -> Failed
//! ```

use crate::domain::correlation::CorrelationId;
use crate::domain::errors::ProvisioningError;
use shared_types::{DeviceIdentity, IssuedCredential, RegistrationOutcome, TemplateParameters};
use std::fmt;

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing published yet.
    Idle,
    /// Issuance request published, waiting.
    AwaitingCredentialIssuance,
    /// Credential stored, ready for registration.
    CredentialsIssued,
    /// Registration request published, waiting.
    AwaitingRegistration,
    /// Registrar assigned an identity.
    Registered,
    /// Persisting the credential and reconnecting with it.
    SwappingCredential,
    /// Done.
    Provisioned,
    /// Terminal failure.
    Failed,
}

impl Phase {
    /// Position in the forward ordering. `Failed` sits outside it.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Idle => Some(0),
            Self::AwaitingCredentialIssuance => Some(1),
            Self::CredentialsIssued => Some(2),
            Self::AwaitingRegistration => Some(3),
            Self::Registered => Some(4),
            Self::SwappingCredential => Some(5),
            Self::Provisioned => Some(6),
            Self::Failed => None,
        }
    }

    /// `Provisioned` or `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Provisioned | Self::Failed)
    }

    /// Forward moves and `Failed` from any non-terminal phase.
    #[must_use]
    pub fn can_transition_to(self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    /// Stable name for logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::AwaitingCredentialIssuance => "AwaitingCredentialIssuance",
            Self::CredentialsIssued => "CredentialsIssued",
            Self::AwaitingRegistration => "AwaitingRegistration",
            Self::Registered => "Registered",
            Self::SwappingCredential => "SwappingCredential",
            Self::Provisioned => "Provisioned",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One device's provisioning attempt.
///
/// Owns the issued credential and the registration outcome. The credential
/// is set once and never replaced; the outcome can only be set after it.
#[derive(Debug, Clone)]
pub struct ProvisioningSession {
    session_id: CorrelationId,
    template_name: String,
    template_parameters: TemplateParameters,
    issued_credential: Option<IssuedCredential>,
    registration_outcome: Option<RegistrationOutcome>,
    phase: Phase,
    failure: Option<ProvisioningError>,
}

impl ProvisioningSession {
    /// Fresh session in `Idle`.
    pub fn new(template_name: impl Into<String>, template_parameters: TemplateParameters) -> Self {
        Self {
            session_id: CorrelationId::new(),
            template_name: template_name.into(),
            template_parameters,
            issued_credential: None,
            registration_outcome: None,
            phase: Phase::Idle,
            failure: None,
        }
    }

    /// Identifier used in logs.
    pub fn session_id(&self) -> CorrelationId {
        self.session_id
    }

    /// Fleet template this session registers against.
    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Parameters forwarded verbatim to registration.
    pub fn template_parameters(&self) -> &TemplateParameters {
        &self.template_parameters
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Credential from a successful issuance.
    pub fn issued_credential(&self) -> Option<&IssuedCredential> {
        self.issued_credential.as_ref()
    }

    /// Outcome of a successful registration.
    pub fn registration_outcome(&self) -> Option<&RegistrationOutcome> {
        self.registration_outcome.as_ref()
    }

    /// Error that moved the session to `Failed`.
    pub fn failure(&self) -> Option<&ProvisioningError> {
        self.failure.as_ref()
    }

    /// Thing name plus certificate, once both are known.
    pub fn identity(&self) -> Option<DeviceIdentity> {
        let credential = self.issued_credential.as_ref()?;
        let outcome = self.registration_outcome.as_ref()?;
        Some(DeviceIdentity {
            thing_name: outcome.thing_name.clone(),
            certificate_id: credential.certificate_id.clone(),
        })
    }

    /// Move to `next`, enforcing the phase ordering.
    pub fn transition(&mut self, next: Phase) -> Result<Phase, ProvisioningError> {
        if !self.phase.can_transition_to(next) {
            return Err(ProvisioningError::IllegalState {
                phase: self.phase,
                reason: format!("cannot move to {next}"),
            });
        }
        let previous = self.phase;
        self.phase = next;
        Ok(previous)
    }

    /// Store the issued credential and move to `CredentialsIssued`.
    pub fn record_credential(&mut self, credential: IssuedCredential) -> Result<(), ProvisioningError> {
        if self.issued_credential.is_some() {
            return Err(ProvisioningError::IllegalState {
                phase: self.phase,
                reason: "credential already issued".to_string(),
            });
        }
        self.transition(Phase::CredentialsIssued)?;
        self.issued_credential = Some(credential);
        Ok(())
    }

    /// Store the registration outcome and move to `Registered`.
    pub fn record_registration(
        &mut self,
        outcome: RegistrationOutcome,
    ) -> Result<(), ProvisioningError> {
        if self.issued_credential.is_none() {
            return Err(ProvisioningError::IllegalState {
                phase: self.phase,
                reason: "registration outcome without an issued credential".to_string(),
            });
        }
        self.transition(Phase::Registered)?;
        self.registration_outcome = Some(outcome);
        Ok(())
    }

    /// Move to `Failed`, keeping the first failure reason.
    ///
    /// Returns false if the session was already terminal.
    pub fn fail(&mut self, error: ProvisioningError) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = Phase::Failed;
        self.failure = Some(error);
        true
    }
}
