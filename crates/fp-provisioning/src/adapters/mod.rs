//! # Adapters
//!
//! Concrete implementations of the outbound ports: credential files on
//! disk, and an in-process registrar answering provisioning requests.

pub mod file_persister;
pub mod simulated_registrar;

pub use file_persister::FileCredentialPersister;
pub use simulated_registrar::{RegistrarScript, RegistrarStats, ReplyScript, SimulatedRegistrar};
