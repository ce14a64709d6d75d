//! # Logical Calls
//!
//! One outstanding request/response exchange and its resolution state.

use crate::domain::correlation::CorrelationId;
use crate::domain::topics::Operation;
use serde_json::Value;
use std::fmt;

/// Resolution state of a call.
///
/// Success and failure payloads live inside the variant, so at most one of
/// them can ever be present.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CallState {
    /// Request published, no reply yet.
    #[default]
    Pending,
    /// First reply arrived on the accepted topic.
    Succeeded(Value),
    /// First reply arrived on the rejected topic.
    Failed(Value),
    /// The wait bound elapsed before any reply.
    TimedOut,
}

impl CallState {
    /// Anything but `Pending`. Resolved states are immutable.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Handle returned by `begin_call`, used to read and wait on the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallHandle {
    /// Which call.
    pub operation: Operation,
    /// Which instance of it.
    pub call_id: CorrelationId,
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.operation, self.call_id)
    }
}

/// Final state of a call, as handed back by `discard`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalCall {
    /// Which call.
    pub operation: Operation,
    /// Which instance of it.
    pub call_id: CorrelationId,
    /// Current state.
    pub state: CallState,
}

impl LogicalCall {
    /// Success body, present iff `Succeeded`.
    #[must_use]
    pub fn result_payload(&self) -> Option<&Value> {
        match &self.state {
            CallState::Succeeded(payload) => Some(payload),
            _ => None,
        }
    }

    /// Failure body, present iff `Failed`.
    #[must_use]
    pub fn error_payload(&self) -> Option<&Value> {
        match &self.state {
            CallState::Failed(payload) => Some(payload),
            _ => None,
        }
    }
}

/// What a delivered reply did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// First reply: the call is now resolved with it.
    Applied,
    /// The call was already resolved; reply dropped.
    Duplicate,
    /// No call of this operation in flight; reply dropped.
    Unsolicited,
}
