//! # Messaging Gateway Port
//!
//! The connection-level contract the provisioning core consumes: connect,
//! subscribe with a callback, publish, and swap the TLS identity.

use crate::events::{BrokerMessage, TopicError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Callback invoked for every message delivered on a subscribed topic.
///
/// Runs on the gateway's own dispatch task, concurrently with the caller.
pub type MessageHandler = Arc<dyn Fn(BrokerMessage) + Send + Sync>;

/// File locations of the TLS identity used for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCredentials {
    /// Root CA bundle.
    pub root_ca: PathBuf,
    /// Private key file.
    pub private_key: PathBuf,
    /// Certificate file.
    pub certificate: PathBuf,
}

impl TlsCredentials {
    /// Bundle the three paths.
    pub fn new(
        root_ca: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
        certificate: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root_ca: root_ca.into(),
            private_key: private_key.into(),
            certificate: certificate.into(),
        }
    }
}

/// Gateway errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Operation requires an open connection.
    #[error("gateway is not connected")]
    NotConnected,

    /// Connect attempted before any credentials were configured.
    #[error("no TLS credentials configured")]
    NoCredentials,

    /// Connection could not be established.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Publish was refused.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Subscribe was refused.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Bad topic name or filter.
    #[error(transparent)]
    Topic(#[from] TopicError),
}

/// Messaging gateway - outbound port.
///
/// Delivery is at-least-once with no ordering guarantee across topics.
/// Reconfiguring credentials takes effect on the next `connect`.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Open the connection with the configured credentials.
    async fn connect(&self) -> Result<(), GatewayError>;

    /// Close the connection and drop every subscription.
    async fn disconnect(&self) -> Result<(), GatewayError>;

    /// Subscribe a callback to a topic filter.
    ///
    /// When this returns `Ok`, every later publish on a matching topic
    /// reaches the handler.
    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), GatewayError>;

    /// Fire-and-forget publish.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), GatewayError>;

    /// Replace the TLS identity used by subsequent connects.
    async fn reconfigure_credentials(&self, credentials: TlsCredentials)
        -> Result<(), GatewayError>;

    /// Whether the connection is currently open.
    fn is_connected(&self) -> bool;
}
