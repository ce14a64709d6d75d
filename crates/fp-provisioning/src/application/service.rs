//! # Provisioning Service
//!
//! Application service sequencing the two dependent calls, the credential
//! swap and the terminal transition.

use async_trait::async_trait;
use fleet_telemetry::{log_call_event, metric_inc, PHASE_TRANSITIONS, SESSIONS};
use serde_json::{json, Value};
use shared_bus::{BrokerMessage, MessageHandler, MessagingGateway, TlsCredentials};
use shared_types::{
    decode_body, encode_body, CreateKeysAndCertificateRequest, DeviceIdentity, IssuedCredential,
    RegisterThingRequest, RegistrationOutcome, RejectionBody, TemplateParameters,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::store::CorrelationStore;
use crate::application::waiter::{await_response, WaitOutcome};
use crate::config::{ConfigError, FlowMode, ProvisioningConfig};
use crate::domain::{
    topics_for, validate_template_name, CorrelationId, Operation, OperationTopics, Phase,
    ProvisioningError, ProvisioningSession,
};
use crate::ports::{CredentialPersister, ProvisioningApi, SessionOutcome};

/// Provisioning Service - drives one device's session over a gateway.
///
/// Precondition: the gateway is connected with the claim credentials and is
/// used by this service only.
pub struct ProvisioningService<G: MessagingGateway, P: CredentialPersister> {
    /// Configuration.
    config: ProvisioningConfig,
    /// Messaging gateway.
    gateway: Arc<G>,
    /// Where the issued credential is written.
    persister: Arc<P>,
    /// In-flight calls, shared with the delivery callbacks.
    store: Arc<CorrelationStore>,
    /// Current session.
    session: Option<ProvisioningSession>,
    /// Topics subscribed on the current connection.
    subscribed: HashSet<String>,
    /// Outcome topics of the current session. Subscriptions outlive a
    /// session, so deliveries on any other topic are dropped.
    reply_topics: Arc<RwLock<HashSet<String>>>,
}

impl<G, P> ProvisioningService<G, P>
where
    G: MessagingGateway + 'static,
    P: CredentialPersister + 'static,
{
    /// Create a new provisioning service.
    pub fn new(
        config: ProvisioningConfig,
        gateway: Arc<G>,
        persister: Arc<P>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            gateway,
            persister,
            store: Arc::new(CorrelationStore::new()),
            session: None,
            subscribed: HashSet::new(),
            reply_topics: Arc::new(RwLock::new(HashSet::new())),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// The current session, if one was started.
    pub fn session(&self) -> Option<&ProvisioningSession> {
        self.session.as_ref()
    }

    /// The correlation store fed by the delivery callbacks.
    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    /// The gateway this service talks through.
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    // =========================================================================
    // Session bookkeeping
    // =========================================================================

    fn session_ref(&self) -> Result<&ProvisioningSession, ProvisioningError> {
        self.session.as_ref().ok_or_else(no_session)
    }

    fn session_mut(&mut self) -> Result<&mut ProvisioningSession, ProvisioningError> {
        self.session.as_mut().ok_or_else(no_session)
    }

    fn require_phase(&self, expected: Phase, step: &str) -> Result<(), ProvisioningError> {
        let phase = self.session_ref()?.phase();
        if phase != expected {
            return Err(ProvisioningError::IllegalState {
                phase,
                reason: format!("{step} requires phase {expected}"),
            });
        }
        Ok(())
    }

    fn advance(&mut self, next: Phase) -> Result<(), ProvisioningError> {
        let session = self.session_mut()?;
        let previous = session.transition(next)?;
        let session_id = session.session_id();
        record_transition(session_id, previous, next);
        Ok(())
    }

    /// Move the session to `Failed` and hand the error back.
    fn fail(&mut self, err: ProvisioningError) -> ProvisioningError {
        if let Some(session) = self.session.as_mut() {
            let previous = session.phase();
            if session.fail(err.clone()) {
                record_transition(session.session_id(), previous, Phase::Failed);
                error!(
                    session_id = %session.session_id(),
                    phase = %previous,
                    kind = err.kind(),
                    retryable = err.is_retryable(),
                    error = %err,
                    "Provisioning step failed"
                );
            }
        }
        err
    }

    fn settle<T>(&mut self, result: Result<T, ProvisioningError>) -> Result<T, ProvisioningError> {
        result.map_err(|err| self.fail(err))
    }

    // =========================================================================
    // Request/response over pub/sub
    // =========================================================================

    /// Subscribe the outcome topics of an operation, once per connection.
    async fn ensure_subscribed(
        &mut self,
        operation: Operation,
        topics: &OperationTopics,
    ) -> Result<(), ProvisioningError> {
        for (topic, accepted) in [(&topics.accepted, true), (&topics.rejected, false)] {
            if self.subscribed.contains(topic) {
                continue;
            }

            let store = Arc::clone(&self.store);
            let reply_topics = Arc::clone(&self.reply_topics);
            let handler: MessageHandler = Arc::new(move |message: BrokerMessage| {
                if !reply_topics.read().contains(&message.topic) {
                    store.reject_stray(operation, &message.topic);
                    return;
                }
                let payload = parse_payload(&message);
                if accepted {
                    store.resolve_success(operation, payload);
                } else {
                    store.resolve_failure(operation, payload);
                }
            });

            self.gateway.subscribe(topic, handler).await?;
            self.subscribed.insert(topic.clone());
            debug!(operation = %operation, topic = %topic, "Subscribed to outcome topic");
        }
        Ok(())
    }

    /// Publish a request and wait for its accepted payload.
    async fn exchange(
        &mut self,
        operation: Operation,
        body: Vec<u8>,
    ) -> Result<Value, ProvisioningError> {
        let template = self.session_ref()?.template_name().to_string();
        let topics = topics_for(operation, &template)?;
        self.ensure_subscribed(operation, &topics).await?;

        let handle = self.store.begin_call(operation);
        if let Err(e) = self.gateway.publish(&topics.request, body).await {
            self.store.discard(&handle);
            return Err(e.into());
        }
        log_call_event!(
            info,
            "Request published",
            operation,
            handle.call_id,
            topic = %topics.request
        );

        let waited = await_response(&self.store, &handle, self.config.wait).await;
        if let Some(call) = self.store.discard(&handle) {
            debug!(call_id = %call.call_id, state = call.state.label(), "Call finished");
        }

        match waited {
            Ok(WaitOutcome::Success(payload)) => Ok(payload),
            Ok(WaitOutcome::Failure(payload)) => {
                let view = RejectionBody::view(&payload);
                warn!(
                    operation = %operation,
                    call_id = %handle.call_id,
                    status_code = ?view.status_code,
                    error_code = ?view.error_code,
                    error_message = ?view.error_message,
                    "Request rejected"
                );
                Err(ProvisioningError::ProtocolRejected { operation, payload })
            }
            Ok(WaitOutcome::Timeout { attempts, waited }) => Err(ProvisioningError::Timeout {
                operation,
                attempts,
                waited,
            }),
            Err(e) => Err(ProvisioningError::IllegalState {
                phase: self.current_phase(),
                reason: e.to_string(),
            }),
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    async fn try_issue_credentials(&mut self) -> Result<(), ProvisioningError> {
        self.require_phase(Phase::Idle, "issue_credentials")?;
        self.advance(Phase::AwaitingCredentialIssuance)?;

        let body = encode_request(
            Operation::IssueCredentials,
            &CreateKeysAndCertificateRequest::default(),
        )?;
        let payload = self.exchange(Operation::IssueCredentials, body).await?;

        let credential: IssuedCredential =
            decode_body(&payload).map_err(|e| ProvisioningError::MalformedResponse {
                operation: Operation::IssueCredentials,
                reason: e.to_string(),
            })?;
        info!(certificate_id = %credential.short_id(), "Credentials issued");

        let session = self.session_mut()?;
        session.record_credential(credential)?;
        record_transition(
            session.session_id(),
            Phase::AwaitingCredentialIssuance,
            Phase::CredentialsIssued,
        );
        Ok(())
    }

    async fn try_register_device(&mut self) -> Result<(), ProvisioningError> {
        let request = {
            let session = self.session_ref()?;
            let Some(credential) = session.issued_credential() else {
                return Err(ProvisioningError::IllegalState {
                    phase: session.phase(),
                    reason: "register_device requires an issued credential".to_string(),
                });
            };
            RegisterThingRequest {
                certificate_ownership_token: credential.certificate_ownership_token.clone(),
                parameters: session.template_parameters().clone(),
            }
        };
        self.require_phase(Phase::CredentialsIssued, "register_device")?;
        self.advance(Phase::AwaitingRegistration)?;

        let body = encode_request(Operation::RegisterDevice, &request)?;
        let payload = self.exchange(Operation::RegisterDevice, body).await?;

        let outcome: RegistrationOutcome =
            decode_body(&payload).map_err(|e| ProvisioningError::MalformedResponse {
                operation: Operation::RegisterDevice,
                reason: e.to_string(),
            })?;
        info!(thing_name = %outcome.thing_name, "Device registered");

        let session = self.session_mut()?;
        session.record_registration(outcome)?;
        record_transition(
            session.session_id(),
            Phase::AwaitingRegistration,
            Phase::Registered,
        );
        Ok(())
    }

    async fn try_swap_credential(&mut self) -> Result<DeviceIdentity, ProvisioningError> {
        self.require_phase(Phase::Registered, "swap_credential")?;
        let (credential, identity) = {
            let session = self.session_ref()?;
            let identity = session.identity().ok_or_else(|| ProvisioningError::IllegalState {
                phase: session.phase(),
                reason: "swap_credential requires credential and registration".to_string(),
            })?;
            let credential = session.issued_credential().cloned().ok_or_else(|| {
                ProvisioningError::IllegalState {
                    phase: session.phase(),
                    reason: "swap_credential requires an issued credential".to_string(),
                }
            })?;
            (credential, identity)
        };
        self.advance(Phase::SwappingCredential)?;

        let persisted = self
            .persister
            .persist(&credential)
            .await
            .map_err(|e| ProvisioningError::CredentialPersistence(e.to_string()))?;
        debug!(
            certificate = %persisted.certificate_path.display(),
            private_key = %persisted.private_key_path.display(),
            "Credential persisted"
        );

        // Subscriptions die with the connection.
        self.gateway.disconnect().await?;
        self.subscribed.clear();

        self.gateway
            .reconfigure_credentials(TlsCredentials::new(
                self.config.root_ca_path.clone(),
                persisted.private_key_path,
                persisted.certificate_path,
            ))
            .await?;
        self.gateway.connect().await?;
        info!(identity = %identity, "Reconnected with issued credential");

        let topic = self.config.liveness_topic_for(&identity.thing_name);
        let liveness = json!({
            "thingName": identity.thing_name,
            "certificateId": identity.certificate_id,
            "status": "online",
        });
        self.gateway
            .publish(&topic, liveness.to_string().into_bytes())
            .await?;
        debug!(topic = %topic, "Liveness published");

        self.advance(Phase::Provisioned)?;
        Ok(identity)
    }

    fn try_complete_without_swap(&mut self) -> Result<DeviceIdentity, ProvisioningError> {
        self.require_phase(Phase::Registered, "complete_without_swap")?;
        let identity = {
            let session = self.session_ref()?;
            session.identity().ok_or_else(|| ProvisioningError::IllegalState {
                phase: session.phase(),
                reason: "registration outcome missing".to_string(),
            })?
        };
        self.advance(Phase::Provisioned)?;
        Ok(identity)
    }

    async fn run_steps(&mut self) -> Result<DeviceIdentity, ProvisioningError> {
        self.issue_credentials().await?;
        self.register_device().await?;
        match self.config.flow {
            FlowMode::Extended => self.swap_credential().await,
            FlowMode::Minimal => self.complete_without_swap(),
        }
    }
}

#[async_trait]
impl<G, P> ProvisioningApi for ProvisioningService<G, P>
where
    G: MessagingGateway + 'static,
    P: CredentialPersister + 'static,
{
    fn start_session(
        &mut self,
        template_name: &str,
        template_parameters: TemplateParameters,
    ) -> Result<(), ProvisioningError> {
        validate_template_name(template_name)?;

        if let Some(previous) = &self.session {
            if !previous.phase().is_terminal() && previous.phase() != Phase::Idle {
                warn!(
                    session_id = %previous.session_id(),
                    phase = %previous.phase(),
                    "Abandoning unfinished session"
                );
            }
        }

        let mut live = HashSet::new();
        for operation in [Operation::IssueCredentials, Operation::RegisterDevice] {
            let topics = topics_for(operation, template_name)?;
            live.insert(topics.accepted);
            live.insert(topics.rejected);
        }
        *self.reply_topics.write() = live;

        let session = ProvisioningSession::new(template_name, template_parameters);
        info!(
            session_id = %session.session_id(),
            template = %template_name,
            flow = ?self.config.flow,
            "Provisioning session started"
        );
        self.session = Some(session);
        Ok(())
    }

    async fn issue_credentials(&mut self) -> Result<(), ProvisioningError> {
        let result = self.try_issue_credentials().await;
        self.settle(result)
    }

    async fn register_device(&mut self) -> Result<(), ProvisioningError> {
        let result = self.try_register_device().await;
        self.settle(result)
    }

    async fn swap_credential(&mut self) -> Result<DeviceIdentity, ProvisioningError> {
        let result = self.try_swap_credential().await;
        self.settle(result)
    }

    fn complete_without_swap(&mut self) -> Result<DeviceIdentity, ProvisioningError> {
        let result = self.try_complete_without_swap();
        self.settle(result)
    }

    async fn run_provisioning_session(
        &mut self,
        template_name: &str,
        template_parameters: TemplateParameters,
    ) -> SessionOutcome {
        let outcome = match self.start_session(template_name, template_parameters) {
            Ok(()) => match self.run_steps().await {
                Ok(identity) => SessionOutcome::Provisioned(identity),
                Err(err) => SessionOutcome::Failed(err),
            },
            Err(err) => SessionOutcome::Failed(err),
        };

        metric_inc!(SESSIONS, &[outcome.label()]);
        match &outcome {
            SessionOutcome::Provisioned(identity) => {
                info!(identity = %identity, "Device provisioned");
            }
            SessionOutcome::Failed(err) => {
                error!(error = %err, retryable = err.is_retryable(), "Provisioning failed");
            }
        }
        outcome
    }

    fn current_phase(&self) -> Phase {
        self.session
            .as_ref()
            .map_or(Phase::Idle, ProvisioningSession::phase)
    }

    fn is_done(&self) -> bool {
        match self.current_phase() {
            Phase::Provisioned => true,
            Phase::Registered => self.config.flow == FlowMode::Minimal,
            _ => false,
        }
    }
}

fn no_session() -> ProvisioningError {
    ProvisioningError::IllegalState {
        phase: Phase::Idle,
        reason: "no session started".to_string(),
    }
}

fn record_transition(session_id: CorrelationId, from: Phase, to: Phase) {
    metric_inc!(PHASE_TRANSITIONS, &[to.as_str()]);
    info!(session_id = %session_id, from = %from, phase = %to, "Phase transition");
}

fn encode_request<T: serde::Serialize>(
    operation: Operation,
    body: &T,
) -> Result<Vec<u8>, ProvisioningError> {
    encode_body(body).map_err(|e| ProvisioningError::MalformedResponse {
        operation,
        reason: e.to_string(),
    })
}

/// JSON body of a delivered message; non-JSON payloads become a JSON string
/// so the call still resolves.
fn parse_payload(message: &BrokerMessage) -> Value {
    match serde_json::from_slice(&message.payload) {
        Ok(value) => value,
        Err(_) => {
            warn!(topic = %message.topic, "Non-JSON payload received");
            Value::String(message.payload_lossy())
        }
    }
}
