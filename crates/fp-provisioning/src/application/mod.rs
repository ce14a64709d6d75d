//! # Application Module
//!
//! Correlation store, response waiter and the service orchestrating them.

pub mod service;
pub mod store;
pub mod waiter;

pub use service::ProvisioningService;
pub use store::{CorrelationStats, CorrelationStore};
pub use waiter::{await_response, WaitError, WaitOutcome, WaitPolicy};
