//! # Shared Bus - Topic-Based Messaging Substrate
//!
//! The publish/subscribe layer the provisioning core talks through.
//!
//! ## Delivery Model
//!
//! - **At-least-once:** a message may arrive more than once
//! - **No cross-topic ordering:** every subscription is dispatched on its own
//!   task, so `.../accepted` and `.../rejected` can race
//! - **Fire-and-forget:** publishing never waits for a reply
//!
//! ```text
//! ┌──────────────┐  publish(topic)  ┌──────────────┐  dispatch   ┌──────────────┐
//! │ BrokerClient │ ───────────────▶ │InMemoryBroker│ ──────────▶ │ handler(msg) │
//! │ (gateway)    │                  │  (broadcast) │  per filter │  callback    │
//! └──────────────┘                  └──────────────┘             └──────────────┘
//! ```
//!
//! The [`MessagingGateway`] trait is the port; [`BrokerClient`] is the
//! in-process implementation backed by [`InMemoryBroker`]. A networked MQTT
//! client implements the same trait.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod client;
pub mod events;
pub mod gateway;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use client::BrokerClient;
pub use events::{validate_topic_name, BrokerMessage, QoS, TopicError, TopicFilter};
pub use gateway::{GatewayError, MessageHandler, MessagingGateway, TlsCredentials};
pub use publisher::InMemoryBroker;
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum messages buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
