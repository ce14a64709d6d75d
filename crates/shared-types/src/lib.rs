//! # Shared Types Crate
//!
//! Entities and JSON message bodies exchanged on the fleet provisioning
//! topics.
//!
//! ## Design Principles
//!
//! - **Wire Fidelity**: Field names follow the broker's camelCase JSON
//!   contract exactly (`certificateId`, `certificateOwnershipToken`, ...).
//! - **Opaque Failures**: Rejection bodies are carried as raw JSON; the typed
//!   [`RejectionBody`] is a read-only view used for logging.
//! - **Secret Hygiene**: Private key material never appears in `Debug`
//!   output.

pub mod entities;
pub mod errors;
pub mod ipc;

pub use entities::*;
pub use errors::*;
pub use ipc::*;
