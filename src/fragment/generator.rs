use super::{
    Fragment, FragmentError, FragmentNames, OnboardingRequest, RoutingSpec, validate_identifier,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

const DEFAULT_CLUSTER_NAME: &str = "${CLUSTER_NAME}";
const DEFAULT_LOG_ROOT: &str = "/var/log/pods";
const ROUTING_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Settings shaping the generated fragments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FragmentConfig {
    /// Value of the `cluster` attribute. Defaults to an env placeholder resolved by the collector.
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    /// Directory where the kubelet writes pod logs.
    #[serde(default = "default_log_root")]
    pub log_root: String,
    /// Emit a `routing/<service>` processor splitting records by log level.
    #[serde(default)]
    pub routing: bool,
}

fn default_cluster_name() -> String {
    DEFAULT_CLUSTER_NAME.to_string()
}

fn default_log_root() -> String {
    DEFAULT_LOG_ROOT.to_string()
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            log_root: default_log_root(),
            routing: false,
        }
    }
}

/// Builds [Fragment]s out of [OnboardingRequest]s. It performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct FragmentGenerator {
    config: FragmentConfig,
}

impl FragmentGenerator {
    pub fn new(config: FragmentConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self, request: &OnboardingRequest) -> Result<Fragment, FragmentError> {
        validate(request)?;
        let names = FragmentNames::for_service(&request.service_name);

        let routing = self.config.routing.then(|| RoutingSpec {
            spec: routing_spec(&request.service_name),
            name: names.routing.clone(),
        });

        Ok(Fragment {
            service_name: request.service_name.clone(),
            receiver_spec: self.receiver_spec(request),
            receiver_name: names.receiver,
            processor_spec: self.processor_spec(request),
            processor_name: names.processor,
            routing,
            exporter_labels: exporter_labels(request),
        })
    }

    fn receiver_spec(&self, request: &OnboardingRequest) -> Value {
        let pods_glob = format!(
            "{}/{}_{}_*",
            self.config.log_root.trim_end_matches('/'),
            request.namespace,
            request.service_name
        );

        json!({
            "include": [format!("{pods_glob}/*/*.log")],
            "exclude": [format!("{pods_glob}/*/*previous*.log")],
            "start_at": "end",
            "include_file_path": true,
            "include_file_name": false,
            "operators": [
                {
                    "type": "router",
                    "routes": [
                        {"output": "json_parser", "expr": r#"body matches "^\\{""#},
                        {"output": "regex_parser", "expr": r#"body matches "^\\d{4}-\\d{2}-\\d{2}""#},
                    ],
                },
                {
                    "type": "json_parser",
                    "id": "json_parser",
                    "parse_from": "body",
                    "parse_to": "attributes.parsed_fields",
                },
                {
                    "type": "regex_parser",
                    "id": "regex_parser",
                    "regex": r"^(?P<timestamp>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[.\d]*Z?) (?P<level>\w+) (?P<message>.*)",
                    "parse_from": "body",
                    "parse_to": "attributes.parsed_fields",
                },
                {
                    "type": "move",
                    "from": "attributes.parsed_fields.level",
                    "to": "attributes.log_level",
                },
                {
                    "type": "move",
                    "from": "attributes.parsed_fields.timestamp",
                    "to": "timestamp",
                },
                {
                    "type": "timestamp_parser",
                    "parse_from": "timestamp",
                    "layout": "2006-01-02T15:04:05.000Z",
                    "if": "timestamp != nil",
                },
            ],
        })
    }

    fn processor_spec(&self, request: &OnboardingRequest) -> Value {
        let mut attributes = vec![
            upsert("service.name", &request.service_name),
            upsert("service.namespace", &request.namespace),
            upsert("team", &request.team),
            upsert("cluster", &self.config.cluster_name),
        ];
        attributes.extend(
            request
                .sorted_labels()
                .into_iter()
                .map(|(key, value)| upsert(key, value)),
        );

        json!({ "attributes": attributes })
    }
}

/// Shared processors every collector document is expected to carry, keyed by name.
pub fn shared_processors() -> Map<String, Value> {
    let mut processors = Map::new();
    processors.insert(
        "batch".to_string(),
        json!({"timeout": "1s", "send_batch_size": 1024, "send_batch_max_size": 2048}),
    );
    processors.insert(
        "memory_limiter".to_string(),
        json!({"limit_mib": 512, "spike_limit_mib": 128, "check_interval": "5s"}),
    );
    processors
}

fn validate(request: &OnboardingRequest) -> Result<(), FragmentError> {
    validate_identifier("service_name", &request.service_name)?;
    validate_identifier("namespace", &request.namespace)
}

fn upsert(key: &str, value: &str) -> Value {
    json!({"key": key, "value": value, "action": "upsert"})
}

fn routing_spec(service_name: &str) -> Value {
    let table: Vec<Value> = ROUTING_LEVELS
        .iter()
        .map(|level| json!({"value": level, "pipelines": [format!("logs/{service_name}_{level}")]}))
        .collect();

    json!({
        "from_attribute": "log_level",
        "attribute_source": "resource",
        "default_pipelines": [format!("logs/{service_name}_default")],
        "table": table,
    })
}

fn exporter_labels(request: &OnboardingRequest) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([
        ("service_name".to_string(), "service.name".to_string()),
        ("namespace".to_string(), "service.namespace".to_string()),
        ("team".to_string(), "team".to_string()),
        ("cluster".to_string(), "cluster".to_string()),
        ("level".to_string(), "level".to_string()),
    ]);
    for key in request.custom_labels.keys() {
        labels.insert(key.clone(), key.clone());
    }
    labels
}
