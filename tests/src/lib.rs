//! # Fleet Provisioning Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── correlation_benchmarks.rs  # Store and topic matching throughput
//! └── src/integration/
//!     ├── e2e_provisioning.rs        # Device runtime, disk, telemetry
//!     └── flows.rs                   # Protocol edge cases across crates
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p fp-tests
//!
//! # By category
//! cargo test -p fp-tests integration::e2e_provisioning::
//! cargo test -p fp-tests integration::flows::
//!
//! # Benchmarks
//! cargo bench -p fp-tests
//! ```

pub mod integration;
