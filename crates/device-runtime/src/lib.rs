//! # Device Runtime Library
//!
//! Configuration and wiring behind the `fleet-provision` binary, exposed for
//! testing. The main entry point is `main.rs`.

pub mod config;
pub mod runtime;

pub use config::{RuntimeConfig, RuntimeConfigError};
pub use runtime::{DeviceRuntime, ProvisioningRun, RuntimeError};
