//! # Fleet Provisioning Runtime
//!
//! Provisions one device and exits: zero when the device ends up with its
//! permanent identity, non-zero otherwise.
//!
//! ## Startup Sequence
//!
//! 1. Load telemetry configuration and initialize logging and metrics
//! 2. Load runtime configuration from `FP_*` variables
//! 3. Start the loopback broker and registrar
//! 4. Run the provisioning session
//! 5. Report the outcome

use anyhow::{bail, Context, Result};
use device_runtime::{DeviceRuntime, RuntimeConfig};
use fleet_telemetry::{init_telemetry, TelemetryConfig};
use fp_provisioning::SessionOutcome;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let telemetry =
        init_telemetry(&telemetry_config).context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env().context("Invalid runtime configuration")?;
    let runtime = DeviceRuntime::new(config).context("Failed to start runtime")?;
    let run = runtime.run().await.context("Provisioning run aborted")?;

    if let Some(metrics) = telemetry.metrics() {
        match metrics.encode() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => error!(error = %e, "Failed to encode metrics"),
        }
    }

    match run.outcome {
        SessionOutcome::Provisioned(identity) => {
            info!(
                thing_name = %identity.thing_name,
                certificate_id = %identity.certificate_id,
                client_id = %run.client_id,
                "Device provisioned"
            );
            Ok(())
        }
        SessionOutcome::Failed(err) => {
            bail!("provisioning failed ({}): {err}", err.kind())
        }
    }
}
