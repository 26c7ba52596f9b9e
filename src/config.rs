//! Service configuration.
//!
//! Read from an optional YAML file and overridden by environment variables prefixed with
//! `OTEL_AUTOMATION_`, nested keys separated by a double underscore. Eg:
//! `OTEL_AUTOMATION_STORE__NAMESPACE=monitoring` sets `store.namespace`.
use crate::fragment::generator::FragmentConfig;
use crate::http_server::config::ServerConfig;
use crate::k8s::client::ClientConfig;
use crate::logging::LoggingConfig;
use crate::mutator::DEFAULT_TARGET_PIPELINE;
use crate::pipeline::backend::DEFAULT_CONFIGMAP_KEY;
use crate::pipeline::reload::WorkloadRef;
use crate::utils::retry::RetryConfig;
use crate::webhook::WebhookConfig;
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

pub const ENV_VAR_PREFIX: &str = "OTEL_AUTOMATION";

const DEFAULT_NAMESPACE: &str = "observability";
const DEFAULT_CONFIGMAP_NAME: &str = "otel-collector-config";

#[derive(thiserror::Error, Debug)]
pub enum AutomationConfigError {
    #[error("could not load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutomationConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LoggingConfig,
    #[serde(default)]
    pub k8s: ClientConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub workload: WorkloadRef,
    #[serde(default)]
    pub fragment: FragmentConfig,
    /// Pipelines a new receiver may be wired into, the first existing one is used.
    #[serde(default = "default_target_pipelines")]
    pub target_pipelines: Vec<String>,
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Conflict retries performed by the HTTP handlers.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Where the shared collector configuration is stored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    ConfigMap {
        #[serde(default = "default_configmap_name")]
        name: String,
        #[serde(default = "default_namespace")]
        namespace: String,
        #[serde(default = "default_configmap_key")]
        key: String,
    },
    CollectorResource { name: String, namespace: String },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::ConfigMap {
            name: default_configmap_name(),
            namespace: default_namespace(),
            key: default_configmap_key(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_configmap_name() -> String {
    DEFAULT_CONFIGMAP_NAME.to_string()
}

fn default_configmap_key() -> String {
    DEFAULT_CONFIGMAP_KEY.to_string()
}

fn default_target_pipelines() -> Vec<String> {
    vec![DEFAULT_TARGET_PIPELINE.to_string()]
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log: LoggingConfig::default(),
            k8s: ClientConfig::default(),
            store: StoreConfig::default(),
            workload: WorkloadRef::default(),
            fragment: FragmentConfig::default(),
            target_pipelines: default_target_pipelines(),
            webhook: WebhookConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl AutomationConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, AutomationConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_VAR_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("target_pipelines")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<AutomationConfig>()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_server::config::Port;
    use crate::pipeline::reload::WorkloadKind;
    use serial_test::serial;
    use std::env;
    use std::io::Write;
    use std::time::Duration;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        let config = AutomationConfig::load(None).unwrap();

        assert_eq!(config, AutomationConfig::default());
        assert_eq!(config.target_pipelines, vec!["logs"]);
        assert_eq!(
            config.store,
            StoreConfig::ConfigMap {
                name: "otel-collector-config".to_string(),
                namespace: "observability".to_string(),
                key: "otel-collector-config.yaml".to_string(),
            }
        );
        assert_eq!(config.workload.to_string(), "DaemonSet observability/otel-collector");
    }

    #[test]
    #[serial]
    fn test_load_file() {
        let file = config_file(
            r#"
server:
  port: 9090
store:
  type: collector_resource
  name: shared
  namespace: telemetry
workload:
  kind: Deployment
  name: gateway
  namespace: telemetry
fragment:
  cluster_name: prod-eu
  routing: true
target_pipelines: [logs/app, logs]
retry:
  max_attempts: 5
  interval: 1s
"#,
        );

        let config = AutomationConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.server.port, Port::from(9090));
        assert_eq!(
            config.store,
            StoreConfig::CollectorResource {
                name: "shared".to_string(),
                namespace: "telemetry".to_string(),
            }
        );
        assert_eq!(config.workload.kind, WorkloadKind::Deployment);
        assert_eq!(config.fragment.cluster_name, "prod-eu");
        assert!(config.fragment.routing);
        assert_eq!(config.target_pipelines, vec!["logs/app", "logs"]);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.interval, Duration::from_secs(1));
    }

    #[test]
    #[serial]
    fn test_env_vars_override_file() {
        let file = config_file("store:\n  type: config_map\n  name: from-file\n");

        let vars = [
            ("OTEL_AUTOMATION_STORE__NAME", "from-env"),
            ("OTEL_AUTOMATION_WEBHOOK__NOTIFIER_URL", "http://n8n:5678/webhook/otel"),
            ("OTEL_AUTOMATION_TARGET_PIPELINES", "logs/app,logs"),
            ("OTEL_AUTOMATION_LOG__LEVEL", "debug"),
        ];
        vars.iter()
            .for_each(|(name, value)| unsafe { env::set_var(name, value) });

        let config = AutomationConfig::load(Some(file.path()));

        vars.iter()
            .for_each(|(name, _)| unsafe { env::remove_var(name) });

        let config = config.unwrap();
        assert_eq!(
            config.store,
            StoreConfig::ConfigMap {
                name: "from-env".to_string(),
                namespace: "observability".to_string(),
                key: "otel-collector-config.yaml".to_string(),
            }
        );
        assert_eq!(config.webhook.notifier_url, "http://n8n:5678/webhook/otel");
        assert_eq!(config.target_pipelines, vec!["logs/app", "logs"]);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    #[serial]
    fn test_load_missing_file() {
        assert!(AutomationConfig::load(Some(Path::new("/non/existent/config.yaml"))).is_err());
    }
}
