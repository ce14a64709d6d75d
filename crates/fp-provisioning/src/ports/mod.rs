//! # Ports Module
//!
//! Hexagonal architecture ports (inbound API, outbound dependencies).
//!
//! The messaging gateway port lives in `shared-bus`, next to the broker it
//! abstracts.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
