//! # Broker Messages
//!
//! Defines the message envelope that flows through the bus and the
//! MQTT-style topic filters used to route it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Delivery guarantee requested for a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce,
    /// Delivered one or more times.
    #[default]
    AtLeastOnce,
}

/// A message published on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerMessage {
    /// Concrete topic name (no wildcards).
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// Delivery guarantee.
    pub qos: QoS,
}

impl BrokerMessage {
    /// Create an at-least-once message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
        }
    }

    /// Payload rendered for logs.
    #[must_use]
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Invalid topic names and filters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// Empty topic or filter.
    #[error("topic must not be empty")]
    Empty,

    /// Wildcards are only legal in subscription filters.
    #[error("topic name contains a wildcard: {0}")]
    WildcardInName(String),

    /// `#` not last, or a wildcard sharing a level with other characters.
    #[error("malformed topic filter: {0}")]
    MalformedFilter(String),
}

/// Validate a concrete topic name used for publishing.
pub fn validate_topic_name(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.contains('+') || topic.contains('#') {
        return Err(TopicError::WildcardInName(topic.to_string()));
    }
    Ok(())
}

/// Subscription filter with MQTT wildcard semantics.
///
/// - `+` matches exactly one level
/// - `#` matches the parent level and everything below it; must be last
/// - topics starting with `$` are never matched by a leading wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter(String);

impl TopicFilter {
    /// Parse and validate a filter.
    pub fn new(filter: impl Into<String>) -> Result<Self, TopicError> {
        let filter = filter.into();
        if filter.is_empty() {
            return Err(TopicError::Empty);
        }

        let levels: Vec<&str> = filter.split('/').collect();
        for (idx, level) in levels.iter().enumerate() {
            let has_wildcard = level.contains('+') || level.contains('#');
            if has_wildcard && level.len() != 1 {
                return Err(TopicError::MalformedFilter(filter));
            }
            if *level == "#" && idx != levels.len() - 1 {
                return Err(TopicError::MalformedFilter(filter));
            }
        }

        Ok(Self(filter))
    }

    /// Filter that matches exactly one concrete topic.
    pub fn exact(topic: &str) -> Result<Self, TopicError> {
        validate_topic_name(topic)?;
        Ok(Self(topic.to_string()))
    }

    /// The filter string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if a concrete topic matches this filter.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        if topic.starts_with('$') && (self.0.starts_with('+') || self.0.starts_with('#')) {
            return false;
        }

        let mut filter_levels = self.0.split('/');
        let mut topic_levels = topic.split('/');

        loop {
            match (filter_levels.next(), topic_levels.next()) {
                (Some("#"), _) => return true,
                (Some("+"), Some(_)) => continue,
                (Some(f), Some(t)) if f == t => continue,
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
