//! # Broker Client
//!
//! In-process [`MessagingGateway`] backed by an [`InMemoryBroker`]. One
//! client models one device connection.

use crate::events::{validate_topic_name, BrokerMessage, QoS, TopicFilter};
use crate::gateway::{GatewayError, MessageHandler, MessagingGateway, TlsCredentials};
use crate::publisher::InMemoryBroker;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Default)]
struct ClientState {
    connected: bool,
    credentials: Option<TlsCredentials>,
    dispatchers: Vec<JoinHandle<()>>,
    pending_connect_failures: u32,
    pending_publish_failures: u32,
    connect_count: u64,
}

/// A single device connection to the in-memory broker.
pub struct BrokerClient {
    client_id: String,
    broker: Arc<InMemoryBroker>,
    state: Mutex<ClientState>,
}

impl BrokerClient {
    /// Create a disconnected client without credentials.
    pub fn new(client_id: impl Into<String>, broker: Arc<InMemoryBroker>) -> Self {
        Self {
            client_id: client_id.into(),
            broker,
            state: Mutex::new(ClientState::default()),
        }
    }

    /// Create a disconnected client with an initial TLS identity.
    pub fn with_credentials(
        client_id: impl Into<String>,
        broker: Arc<InMemoryBroker>,
        credentials: TlsCredentials,
    ) -> Self {
        let client = Self::new(client_id, broker);
        client.state.lock().credentials = Some(credentials);
        client
    }

    /// Client identifier presented to the broker.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The broker this client talks to.
    #[must_use]
    pub fn broker(&self) -> &Arc<InMemoryBroker> {
        &self.broker
    }

    /// Credentials the next connect will use.
    #[must_use]
    pub fn credentials(&self) -> Option<TlsCredentials> {
        self.state.lock().credentials.clone()
    }

    /// Number of successful connects so far.
    #[must_use]
    pub fn connect_count(&self) -> u64 {
        self.state.lock().connect_count
    }

    /// Number of live subscription dispatch tasks.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.state
            .lock()
            .dispatchers
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Make the next `count` connects fail.
    pub fn inject_connect_failures(&self, count: u32) {
        self.state.lock().pending_connect_failures = count;
    }

    /// Make the next `count` publishes fail.
    pub fn inject_publish_failures(&self, count: u32) {
        self.state.lock().pending_publish_failures = count;
    }
}

#[async_trait]
impl MessagingGateway for BrokerClient {
    async fn connect(&self) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        if state.connected {
            return Ok(());
        }
        if state.credentials.is_none() {
            return Err(GatewayError::NoCredentials);
        }
        if state.pending_connect_failures > 0 {
            state.pending_connect_failures -= 1;
            warn!(client_id = %self.client_id, "Connect refused");
            return Err(GatewayError::ConnectFailed(format!(
                "broker refused connection for {}",
                self.client_id
            )));
        }

        state.connected = true;
        state.connect_count += 1;
        let certificate = state
            .credentials
            .as_ref()
            .map(|c| c.certificate.display().to_string())
            .unwrap_or_default();
        info!(client_id = %self.client_id, certificate = %certificate, "Connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        for dispatcher in state.dispatchers.drain(..) {
            dispatcher.abort();
        }
        if state.connected {
            state.connected = false;
            info!(client_id = %self.client_id, "Disconnected");
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), GatewayError> {
        let filter = TopicFilter::new(topic)?;

        let mut state = self.state.lock();
        if !state.connected {
            return Err(GatewayError::NotConnected);
        }

        // The subscription exists before this returns, so a publish issued
        // right after cannot be missed.
        let mut subscription = self.broker.subscribe(filter);
        let dispatcher = tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                handler(message);
            }
        });
        state.dispatchers.push(dispatcher);

        debug!(client_id = %self.client_id, topic, "Subscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), GatewayError> {
        validate_topic_name(topic)?;
        {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(GatewayError::NotConnected);
            }
            if state.pending_publish_failures > 0 {
                state.pending_publish_failures -= 1;
                return Err(GatewayError::PublishFailed(format!(
                    "broker refused publish on {topic}"
                )));
            }
        }

        let receivers = self.broker.publish(BrokerMessage {
            topic: topic.to_string(),
            payload,
            qos: QoS::AtLeastOnce,
        });
        debug!(client_id = %self.client_id, topic, receivers, "Published");
        Ok(())
    }

    async fn reconfigure_credentials(
        &self,
        credentials: TlsCredentials,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        if state.connected {
            debug!(
                client_id = %self.client_id,
                "Credentials replaced while connected; effective on next connect"
            );
        }
        state.credentials = Some(credentials);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }
}

impl Drop for BrokerClient {
    fn drop(&mut self) {
        for dispatcher in self.state.get_mut().dispatchers.drain(..) {
            dispatcher.abort();
        }
    }
}
