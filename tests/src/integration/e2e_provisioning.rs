//! # End-to-End Provisioning Tests
//!
//! The device runtime as the binary drives it:
//!
//! ```text
//! FP_* variables ──→ RuntimeConfig ──→ DeviceRuntime
//!                                          │
//!        claim connect ──→ issue ──→ register ──→ persist ──→ reconnect ──→ liveness
//!                                                    │
//!                                             credential dir
//! ```
//!
//! ## Test Categories
//!
//! 1. **Happy Path**: Environment to provisioned device with files on disk
//! 2. **Flows**: Minimal flow, custom liveness topic
//! 3. **Telemetry**: Metrics reflect a finished session
//! 4. **Isolation**: Independent devices provisioned concurrently

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use device_runtime::{DeviceRuntime, RuntimeConfig, RuntimeConfigError};
    use fp_provisioning::SessionOutcome;
    use shared_bus::MessagingGateway;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn config_from(dir: &Path, extra: &[(&str, &str)]) -> RuntimeConfig {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("FP_TEMPLATE_NAME".to_string(), "FactoryLine1".to_string()),
            ("FP_CLIENT_ID".to_string(), "sensor-0042".to_string()),
            (
                "FP_CREDENTIAL_DIR".to_string(),
                dir.display().to_string(),
            ),
            ("FP_POLL_INTERVAL_MS".to_string(), "20".to_string()),
            ("FP_MAX_ATTEMPTS".to_string(), "50".to_string()),
        ]);
        for (key, value) in extra {
            vars.insert(key.to_string(), value.to_string());
        }
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_environment_to_provisioned_device() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_from(
            dir.path(),
            &[
                ("FP_TEMPLATE_PARAMETERS", r#"{"DeviceLocation": "Seattle"}"#),
                ("FP_SIMULATED_THING_NAME", "thing-42"),
            ],
        );

        let runtime = DeviceRuntime::new(config).unwrap();
        let run = runtime.run().await.unwrap();

        let SessionOutcome::Provisioned(identity) = &run.outcome else {
            panic!("expected provisioned, got {:?}", run.outcome);
        };
        assert_eq!(identity.thing_name, "thing-42");

        // The registrar saw the configured parameters verbatim.
        let registration = runtime.registrar().last_registration().unwrap();
        assert_eq!(registration.parameters["DeviceLocation"], "Seattle");

        // Issued credential written under the configured directory.
        let credentials = run.credentials.unwrap();
        let cert_name = format!("{}-certificate.pem.crt", identity.certificate_id);
        let key_name = format!("{}-private.pem.key", identity.certificate_id);
        assert_eq!(credentials.certificate, dir.path().join(cert_name));
        assert_eq!(credentials.private_key, dir.path().join(key_name));
        assert!(std::fs::read_to_string(&credentials.certificate)
            .unwrap()
            .contains(&identity.certificate_id));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&credentials.private_key)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        // Claim connect plus the reconnect under the issued identity.
        assert_eq!(runtime.client().connect_count(), 2);
        assert_eq!(
            runtime
                .broker()
                .published_count("devices/thing-42/liveness"),
            1
        );
        assert!(!runtime.client().is_connected());
    }

    #[test]
    fn test_missing_template_is_a_config_error() {
        let result = RuntimeConfig::from_lookup(|_| None);
        assert_eq!(result.unwrap_err(), RuntimeConfigError::MissingTemplateName);
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_minimal_flow_from_environment() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_from(dir.path(), &[("FP_MINIMAL_FLOW", "true")]);

        let runtime = DeviceRuntime::new(config).unwrap();
        let run = runtime.run().await.unwrap();

        assert!(run.outcome.is_provisioned());
        assert_eq!(runtime.client().connect_count(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(
            runtime
                .broker()
                .published_count("devices/sensor-0042/liveness"),
            0
        );
    }

    #[tokio::test]
    async fn test_custom_liveness_topic() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_from(
            dir.path(),
            &[("FP_LIVENESS_TOPIC", "fleet/{thing_name}/online")],
        );

        let runtime = DeviceRuntime::new(config).unwrap();
        let run = runtime.run().await.unwrap();

        assert!(run.outcome.is_provisioned());
        assert_eq!(
            runtime.broker().published_count("fleet/sensor-0042/online"),
            1
        );
    }

    // =============================================================================
    // TELEMETRY
    // =============================================================================

    #[tokio::test]
    async fn test_metrics_record_the_session() {
        let metrics = fleet_telemetry::register_metrics().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let runtime = DeviceRuntime::new(config_from(dir.path(), &[])).unwrap();
        let run = runtime.run().await.unwrap();
        assert!(run.outcome.is_provisioned());

        let text = metrics.encode().unwrap();
        assert!(text.contains("fp_sessions_total"));
        assert!(text.contains("fp_calls_started_total"));
        assert!(text.contains(r#"operation="RegisterDevice""#));
        assert!(text.contains("fp_phase_transitions_total"));
    }

    // =============================================================================
    // ISOLATION
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_devices_do_not_interfere() {
        let dirs: Vec<_> = (0..4).map(|_| tempfile::tempdir().unwrap()).collect();
        let mut handles = Vec::new();

        for (i, dir) in dirs.iter().enumerate() {
            let client_id = format!("sensor-{i}");
            let config = config_from(dir.path(), &[("FP_CLIENT_ID", client_id.as_str())]);
            handles.push(tokio::spawn(async move {
                let runtime = DeviceRuntime::new(config).unwrap();
                let run = runtime.run().await.unwrap();
                (run, runtime.client().connect_count())
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let (run, connects) = handle.await.unwrap();
            let SessionOutcome::Provisioned(identity) = run.outcome else {
                panic!("device {i} failed");
            };
            assert_eq!(identity.thing_name, format!("sensor-{i}"));
            assert_eq!(connects, 2);
        }
    }
}
