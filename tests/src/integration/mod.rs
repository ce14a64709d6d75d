//! # Integration Tests
//!
//! Cross-crate scenarios: the provisioning core driven over the shared bus
//! against the simulated registrar, and the device runtime end to end.

pub mod e2e_provisioning;
pub mod flows;
