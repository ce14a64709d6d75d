//! # In-Memory Broker
//!
//! Defines the publishing side of the bus.

use crate::events::{BrokerMessage, TopicFilter};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// In-memory broker.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer fan-out;
/// each [`Subscription`] filters the shared stream by its own topic filter.
/// Suitable for a single process; a networked deployment replaces it with a
/// real broker behind [`crate::MessagingGateway`].
pub struct InMemoryBroker {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<BrokerMessage>,

    /// Active subscription count by filter.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Publish count by concrete topic.
    published_by_topic: RwLock<HashMap<String, u64>>,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryBroker {
    /// Create a new broker with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new broker with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            published_by_topic: RwLock::new(HashMap::new()),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to messages matching a filter.
    ///
    /// The subscription observes every message published after this call
    /// returns.
    #[must_use]
    pub fn subscribe(&self, filter: TopicFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let key = filter.as_str().to_string();

        *self.subscriptions.write().entry(key.clone()).or_insert(0) += 1;

        debug!(filter = %filter, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), key)
    }

    /// Publish a message to every current subscriber.
    ///
    /// Returns the number of receivers the message was handed to. Zero
    /// receivers is not an error: the bus is fire-and-forget.
    pub fn publish(&self, message: BrokerMessage) -> usize {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        *self
            .published_by_topic
            .write()
            .entry(message.topic.clone())
            .or_insert(0) += 1;

        let topic = message.topic.clone();
        match self.sender.send(message) {
            Ok(receivers) => {
                trace!(topic = %topic, receivers, "Message published");
                receivers
            }
            Err(_) => {
                debug!(topic = %topic, "Message dropped (no receivers)");
                0
            }
        }
    }

    /// Number of messages ever published on a concrete topic.
    #[must_use]
    pub fn published_count(&self, topic: &str) -> u64 {
        self.published_by_topic.read().get(topic).copied().unwrap_or(0)
    }

    /// Total messages published.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Number of active subscriptions for a filter.
    #[must_use]
    pub fn subscription_count(&self, filter: &str) -> usize {
        self.subscriptions.read().get(filter).copied().unwrap_or(0)
    }

    /// Get the number of active receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}
