//! # Runtime Configuration
//!
//! Everything the binary needs to provision one device, read from the
//! environment.

use fleet_telemetry::parse_flag;
use fp_provisioning::{
    validate_template_name, ConfigError, FlowMode, ProvisioningConfig, TopicError, WaitPolicy,
};
use shared_bus::TlsCredentials;
use shared_types::TemplateParameters;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Default root CA bundle.
pub const DEFAULT_ROOT_CA: &str = "root-CA.crt";
/// Default claim certificate.
pub const DEFAULT_CLAIM_CERT: &str = "claim.cert.pem";
/// Default claim private key.
pub const DEFAULT_CLAIM_KEY: &str = "claim.private.key";
/// Default directory for issued credentials.
pub const DEFAULT_CREDENTIAL_DIR: &str = "credentials";

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeConfigError {
    /// `FP_TEMPLATE_NAME` is unset or blank.
    #[error("FP_TEMPLATE_NAME is required")]
    MissingTemplateName,

    /// Template name cannot be embedded in a topic.
    #[error("invalid template name: {0}")]
    InvalidTemplate(#[from] TopicError),

    /// `FP_TEMPLATE_PARAMETERS` is not a JSON object.
    #[error("FP_TEMPLATE_PARAMETERS must be a JSON object: {0}")]
    InvalidParameters(String),

    /// A numeric variable did not parse.
    #[error("{variable} must be a positive integer, got {value:?}")]
    InvalidNumber {
        /// Variable name
        variable: &'static str,
        /// Raw value
        value: String,
    },

    /// The assembled core configuration is unusable.
    #[error(transparent)]
    Provisioning(#[from] ConfigError),
}

/// Configuration of one provisioning run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Fleet template to register against.
    pub template_name: String,

    /// Parameters forwarded verbatim to the template.
    pub template_parameters: TemplateParameters,

    /// Client identifier presented to the broker.
    pub client_id: String,

    /// Claim identity for the bootstrap connection.
    pub claim: TlsCredentials,

    /// Where issued credentials are written.
    pub credential_dir: PathBuf,

    /// Core settings: wait bound, flow, liveness topic.
    pub provisioning: ProvisioningConfig,

    /// Thing name the loopback registrar assigns.
    pub simulated_thing_name: Option<String>,
}

impl RuntimeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FP_TEMPLATE_NAME`: Fleet template (required)
    /// - `FP_TEMPLATE_PARAMETERS`: JSON object of template parameters (default: `{}`)
    /// - `FP_CLIENT_ID`: Broker client id (default: `fleet-device-<uuid>`)
    /// - `FP_ROOT_CA`, `FP_CLAIM_CERT`, `FP_CLAIM_KEY`: Claim identity files
    /// - `FP_CREDENTIAL_DIR`: Issued credential directory (default: credentials)
    /// - `FP_POLL_INTERVAL_MS`: Wait poll interval (default: 1000)
    /// - `FP_MAX_ATTEMPTS`: Wait attempts (default: 10)
    /// - `FP_MINIMAL_FLOW`: Stop after registration (default: false)
    /// - `FP_LIVENESS_TOPIC`: Liveness topic, `{thing_name}` substituted
    /// - `FP_SIMULATED_THING_NAME`: Thing name assigned in loopback mode
    pub fn from_env() -> Result<Self, RuntimeConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RuntimeConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let template_name = var("FP_TEMPLATE_NAME")
            .map(|v| v.trim().to_string())
            .ok_or(RuntimeConfigError::MissingTemplateName)?;
        validate_template_name(&template_name)?;

        let template_parameters = match var("FP_TEMPLATE_PARAMETERS") {
            Some(raw) => parse_parameters(&raw)?,
            None => TemplateParameters::new(),
        };

        let root_ca = PathBuf::from(var("FP_ROOT_CA").unwrap_or_else(|| DEFAULT_ROOT_CA.into()));
        let claim = TlsCredentials::new(
            root_ca.clone(),
            var("FP_CLAIM_KEY").unwrap_or_else(|| DEFAULT_CLAIM_KEY.into()),
            var("FP_CLAIM_CERT").unwrap_or_else(|| DEFAULT_CLAIM_CERT.into()),
        );

        let mut provisioning = ProvisioningConfig {
            root_ca_path: root_ca,
            ..ProvisioningConfig::default()
        };
        if let Some(raw) = var("FP_POLL_INTERVAL_MS") {
            let millis = parse_positive("FP_POLL_INTERVAL_MS", &raw)?;
            provisioning.wait.poll_interval = Duration::from_millis(millis);
        }
        if let Some(raw) = var("FP_MAX_ATTEMPTS") {
            let attempts = parse_positive("FP_MAX_ATTEMPTS", &raw)?;
            provisioning.wait.max_attempts =
                u32::try_from(attempts).map_err(|_| RuntimeConfigError::InvalidNumber {
                    variable: "FP_MAX_ATTEMPTS",
                    value: raw.clone(),
                })?;
        }
        if var("FP_MINIMAL_FLOW").is_some_and(|v| parse_flag(&v, false)) {
            provisioning.flow = FlowMode::Minimal;
        }
        if let Some(topic) = var("FP_LIVENESS_TOPIC") {
            provisioning.liveness_topic = topic;
        }
        provisioning.validate()?;

        Ok(Self {
            template_name,
            template_parameters,
            client_id: var("FP_CLIENT_ID")
                .unwrap_or_else(|| format!("fleet-device-{}", Uuid::new_v4())),
            claim,
            credential_dir: PathBuf::from(
                var("FP_CREDENTIAL_DIR").unwrap_or_else(|| DEFAULT_CREDENTIAL_DIR.into()),
            ),
            provisioning,
            simulated_thing_name: var("FP_SIMULATED_THING_NAME"),
        })
    }

    /// Minimal configuration for tests: fast waits, credentials under `dir`.
    pub fn for_testing(template_name: &str, dir: impl Into<PathBuf>) -> Self {
        Self {
            template_name: template_name.to_string(),
            template_parameters: TemplateParameters::new(),
            client_id: "fleet-device-test".to_string(),
            claim: TlsCredentials::new(DEFAULT_ROOT_CA, DEFAULT_CLAIM_KEY, DEFAULT_CLAIM_CERT),
            credential_dir: dir.into(),
            provisioning: ProvisioningConfig {
                wait: WaitPolicy::new(Duration::from_millis(20), 50),
                ..ProvisioningConfig::default()
            },
            simulated_thing_name: None,
        }
    }
}

fn parse_parameters(raw: &str) -> Result<TemplateParameters, RuntimeConfigError> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(RuntimeConfigError::InvalidParameters(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(RuntimeConfigError::InvalidParameters(e.to_string())),
    }
}

fn parse_positive(variable: &'static str, raw: &str) -> Result<u64, RuntimeConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(RuntimeConfigError::InvalidNumber {
            variable,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<RuntimeConfig, RuntimeConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_template_name_required() {
        assert_eq!(load(&[]).unwrap_err(), RuntimeConfigError::MissingTemplateName);
        assert_eq!(
            load(&[("FP_TEMPLATE_NAME", "  ")]).unwrap_err(),
            RuntimeConfigError::MissingTemplateName
        );
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("FP_TEMPLATE_NAME", "FactoryLine1")]).unwrap();

        assert_eq!(config.template_name, "FactoryLine1");
        assert!(config.template_parameters.is_empty());
        assert!(config.client_id.starts_with("fleet-device-"));
        assert_eq!(
            config.claim,
            TlsCredentials::new(DEFAULT_ROOT_CA, DEFAULT_CLAIM_KEY, DEFAULT_CLAIM_CERT)
        );
        assert_eq!(config.credential_dir, PathBuf::from(DEFAULT_CREDENTIAL_DIR));
        assert_eq!(config.provisioning.wait.poll_interval, Duration::from_secs(1));
        assert_eq!(config.provisioning.wait.max_attempts, 10);
        assert_eq!(config.provisioning.flow, FlowMode::Extended);
        assert!(config.simulated_thing_name.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("FP_TEMPLATE_NAME", "FactoryLine1"),
            ("FP_TEMPLATE_PARAMETERS", r#"{"DeviceLocation": "Seattle"}"#),
            ("FP_CLIENT_ID", "sensor-7"),
            ("FP_ROOT_CA", "/etc/fleet/ca.pem"),
            ("FP_CLAIM_CERT", "/etc/fleet/claim.crt"),
            ("FP_CLAIM_KEY", "/etc/fleet/claim.key"),
            ("FP_CREDENTIAL_DIR", "/var/lib/fleet"),
            ("FP_POLL_INTERVAL_MS", "250"),
            ("FP_MAX_ATTEMPTS", "4"),
            ("FP_MINIMAL_FLOW", "yes"),
            ("FP_LIVENESS_TOPIC", "fleet/{thing_name}/up"),
            ("FP_SIMULATED_THING_NAME", "sensor-thing"),
        ])
        .unwrap();

        assert_eq!(config.template_parameters["DeviceLocation"], "Seattle");
        assert_eq!(config.client_id, "sensor-7");
        assert_eq!(
            config.claim,
            TlsCredentials::new(
                "/etc/fleet/ca.pem",
                "/etc/fleet/claim.key",
                "/etc/fleet/claim.crt"
            )
        );
        assert_eq!(
            config.provisioning.root_ca_path,
            PathBuf::from("/etc/fleet/ca.pem")
        );
        assert_eq!(config.credential_dir, PathBuf::from("/var/lib/fleet"));
        assert_eq!(
            config.provisioning.wait.poll_interval,
            Duration::from_millis(250)
        );
        assert_eq!(config.provisioning.wait.max_attempts, 4);
        assert_eq!(config.provisioning.flow, FlowMode::Minimal);
        assert_eq!(
            config.provisioning.liveness_topic_for("t1"),
            "fleet/t1/up"
        );
        assert_eq!(config.simulated_thing_name.as_deref(), Some("sensor-thing"));
    }

    #[test]
    fn test_rejects_bad_template_name() {
        assert!(matches!(
            load(&[("FP_TEMPLATE_NAME", "line/+")]),
            Err(RuntimeConfigError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_rejects_non_object_parameters() {
        for raw in ["[1, 2]", "not json", "\"text\""] {
            assert!(matches!(
                load(&[("FP_TEMPLATE_NAME", "t"), ("FP_TEMPLATE_PARAMETERS", raw)]),
                Err(RuntimeConfigError::InvalidParameters(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_and_garbage_numbers() {
        for (variable, raw) in [
            ("FP_POLL_INTERVAL_MS", "0"),
            ("FP_MAX_ATTEMPTS", "-3"),
            ("FP_MAX_ATTEMPTS", "many"),
        ] {
            let err = load(&[("FP_TEMPLATE_NAME", "t"), (variable, raw)]).unwrap_err();
            assert!(matches!(err, RuntimeConfigError::InvalidNumber { .. }));
        }
    }

    #[test]
    fn test_unknown_flag_keeps_extended_flow() {
        let config = load(&[("FP_TEMPLATE_NAME", "t"), ("FP_MINIMAL_FLOW", "maybe")]).unwrap();
        assert_eq!(config.provisioning.flow, FlowMode::Extended);
    }
}
