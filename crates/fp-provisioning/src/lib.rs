//! # Fleet Provisioning Core
//!
//! Turns a device holding only a shared claim identity into a uniquely
//! registered device with its own certificate, by driving two asynchronous
//! request/response exchanges over a publish/subscribe broker.
//!
//! ## Session Lifecycle
//!
//! ```text
//! [Idle] ──start──→ [AwaitingCredentials] ──issue──→ [CredentialsIssued]
//!                                                          │
//!        [Provisioned] ←──swap── [Registered] ←──register──┘
//!
//! any non-terminal phase ──step failure──→ [Failed]
//! ```
//!
//! | Step | Method | Effect |
//! |------|--------|--------|
//! | Issue | `issue_credentials()` | Store the issued credential and ownership token |
//! | Register | `register_device()` | Exchange the token for a thing name |
//! | Swap | `swap_credential()` | Persist, reconnect under the issued identity, announce liveness |
//! | Minimal finish | `complete_without_swap()` | Stop after registration |
//!
//! ## Correlation
//!
//! Every request is tracked as a logical call keyed by its operation. Replies
//! arrive on the operation's accepted or rejected topic and resolve the call
//! at most once: the first reply wins, later ones are counted and ignored.
//! The waiter polls the call state on a fixed interval for a bounded number
//! of attempts and reports a timeout distinctly from a protocol rejection.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - file persister, simulated registrar               │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - ProvisioningApi trait                     │
//! │  ports/outbound.rs - CredentialPersister trait                 │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  application/ - CorrelationStore, await_response, service      │
//! │  domain/      - topics, calls, session state machine, errors   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use fp_provisioning::{
//!     FileCredentialPersister, ProvisioningApi, ProvisioningConfig, ProvisioningService,
//!     RegistrarScript, SimulatedRegistrar,
//! };
//! use shared_bus::{BrokerClient, InMemoryBroker, MessagingGateway, TlsCredentials};
//! use shared_types::TemplateParameters;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = Arc::new(InMemoryBroker::new());
//! let _registrar = SimulatedRegistrar::spawn(broker.clone(), RegistrarScript::default())?;
//!
//! let client = Arc::new(BrokerClient::with_credentials(
//!     "device-1",
//!     broker,
//!     TlsCredentials::new("root-CA.crt", "claim.private.key", "claim.cert.pem"),
//! ));
//! client.connect().await?;
//!
//! let persister = Arc::new(FileCredentialPersister::new("/var/lib/fleet"));
//! let mut service = ProvisioningService::new(ProvisioningConfig::default(), client, persister)?;
//! let outcome = service
//!     .run_provisioning_session("FactoryLine1", TemplateParameters::new())
//!     .await;
//! assert!(outcome.is_provisioned());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Domain
pub use domain::{
    topics_for, validate_template_name, CallHandle, CallState, CorrelationId, LogicalCall,
    Operation, OperationTopics, Phase, ProvisioningError, ProvisioningSession, Resolution,
    TopicError,
};

// Application
pub use application::{
    await_response, CorrelationStats, CorrelationStore, ProvisioningService, WaitError,
    WaitOutcome, WaitPolicy,
};

// Ports
pub use ports::{
    CredentialPersister, MockCredentialPersister, PersistError, PersistedCredential,
    ProvisioningApi, SessionOutcome,
};

// Adapters
pub use adapters::{
    FileCredentialPersister, RegistrarScript, RegistrarStats, ReplyScript, SimulatedRegistrar,
};

// Configuration
pub use config::{ConfigError, FlowMode, ProvisioningConfig};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
