//! # Domain Layer
//!
//! Pure types: topics, call identity and state, the session state machine
//! and errors. No I/O.

pub mod call;
pub mod correlation;
pub mod errors;
pub mod session;
pub mod topics;

pub use call::{CallHandle, CallState, LogicalCall, Resolution};
pub use correlation::CorrelationId;
pub use errors::{ProvisioningError, TopicError};
pub use session::{Phase, ProvisioningSession};
pub use topics::{
    topics_for, validate_template_name, Operation, OperationTopics, ACCEPTED_SUFFIX,
    CREATE_CERTIFICATE_TOPIC, PROVISIONING_TEMPLATES_PREFIX, REJECTED_SUFFIX,
};
