//! # Device Runtime
//!
//! Wires the broker, the claim connection, the credential persister and the
//! provisioning core, then runs one session.
//!
//! ## Startup Sequence
//!
//! 1. Start the in-process broker and the simulated registrar (loopback)
//! 2. Connect with the claim credentials
//! 3. Run the provisioning session
//! 4. Disconnect

use crate::config::RuntimeConfig;
use fp_provisioning::{
    ConfigError, FileCredentialPersister, ProvisioningApi, ProvisioningService, RegistrarScript,
    SessionOutcome, SimulatedRegistrar,
};
use shared_bus::{
    BrokerClient, GatewayError, InMemoryBroker, MessagingGateway, TlsCredentials, TopicError,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Errors that stop a run before a session outcome exists.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The loopback registrar could not subscribe.
    #[error("failed to start simulated registrar: {0}")]
    Registrar(#[from] TopicError),

    /// The bootstrap connection with the claim credentials failed.
    #[error("claim connection failed: {0}")]
    ClaimConnect(#[source] GatewayError),

    /// The core rejected its configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct ProvisioningRun {
    /// Session result.
    pub outcome: SessionOutcome,
    /// Client id used for the connection.
    pub client_id: String,
    /// Credentials the connection ended up configured with.
    pub credentials: Option<TlsCredentials>,
}

/// The main runtime provisioning one device.
pub struct DeviceRuntime {
    config: RuntimeConfig,
    broker: Arc<InMemoryBroker>,
    client: Arc<BrokerClient>,
    registrar: SimulatedRegistrar,
}

impl DeviceRuntime {
    /// Start the loopback broker and registrar.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let broker = Arc::new(InMemoryBroker::new());

        let script = RegistrarScript {
            thing_name: config
                .simulated_thing_name
                .clone()
                .unwrap_or_else(|| config.client_id.clone()),
            certificate_id: Uuid::new_v4().simple().to_string(),
            ..RegistrarScript::default()
        };
        let registrar = SimulatedRegistrar::spawn(Arc::clone(&broker), script)?;

        let client = Arc::new(BrokerClient::with_credentials(
            config.client_id.clone(),
            Arc::clone(&broker),
            config.claim.clone(),
        ));

        Ok(Self {
            config,
            broker,
            client,
            registrar,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The in-process broker.
    pub fn broker(&self) -> &Arc<InMemoryBroker> {
        &self.broker
    }

    /// The device connection.
    pub fn client(&self) -> &Arc<BrokerClient> {
        &self.client
    }

    /// The loopback registrar.
    pub fn registrar(&self) -> &SimulatedRegistrar {
        &self.registrar
    }

    /// Connect with the claim identity and run one provisioning session.
    pub async fn run(&self) -> Result<ProvisioningRun, RuntimeError> {
        info!("===========================================");
        info!("  Fleet Provisioning v{}", fp_provisioning::VERSION);
        info!("===========================================");
        info!(
            client_id = %self.config.client_id,
            template = %self.config.template_name,
            flow = ?self.config.provisioning.flow,
            credential_dir = %self.config.credential_dir.display(),
            "Starting provisioning run"
        );

        self.client
            .connect()
            .await
            .map_err(RuntimeError::ClaimConnect)?;

        let persister = Arc::new(FileCredentialPersister::new(&self.config.credential_dir));
        let mut service = ProvisioningService::new(
            self.config.provisioning.clone(),
            Arc::clone(&self.client),
            persister,
        )?;

        let outcome = service
            .run_provisioning_session(
                &self.config.template_name,
                self.config.template_parameters.clone(),
            )
            .await;

        let credentials = self.client.credentials();
        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "Disconnect failed");
        }

        Ok(ProvisioningRun {
            outcome,
            client_id: self.config.client_id.clone(),
            credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_provisions_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::for_testing("FactoryLine1", dir.path());
        config.simulated_thing_name = Some("bench-device".to_string());

        let runtime = DeviceRuntime::new(config).unwrap();
        let run = runtime.run().await.unwrap();

        let SessionOutcome::Provisioned(identity) = &run.outcome else {
            panic!("expected provisioned, got {:?}", run.outcome);
        };
        assert_eq!(identity.thing_name, "bench-device");
        assert_eq!(identity.certificate_id.len(), 32);

        let credentials = run.credentials.unwrap();
        assert!(credentials.certificate.starts_with(dir.path()));
        assert!(credentials.certificate.exists());
        assert!(credentials.private_key.exists());
        assert!(!runtime.client().is_connected());
    }

    #[tokio::test]
    async fn test_thing_name_defaults_to_client_id() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::for_testing("FactoryLine1", dir.path());

        let runtime = DeviceRuntime::new(config).unwrap();
        let run = runtime.run().await.unwrap();

        let SessionOutcome::Provisioned(identity) = run.outcome else {
            panic!("expected provisioned");
        };
        assert_eq!(identity.thing_name, "fleet-device-test");
        assert_eq!(run.client_id, "fleet-device-test");
    }

    #[tokio::test]
    async fn test_minimal_flow_keeps_claim_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::for_testing("FactoryLine1", dir.path());
        config.provisioning = config.provisioning.minimal();
        let claim = config.claim.clone();

        let runtime = DeviceRuntime::new(config).unwrap();
        let run = runtime.run().await.unwrap();

        assert!(run.outcome.is_provisioned());
        assert_eq!(run.credentials, Some(claim));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
