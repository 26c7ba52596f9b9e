//! Dedicated `OpenTelemetryCollector` resources.
//!
//! Besides joining the shared pipeline, a service can be given a collector of its own, managed by
//! the OpenTelemetry operator. The resource carries a complete, self-contained configuration that
//! reuses the labeling rules of the service's [Fragment](super::Fragment).
use super::generator::{FragmentGenerator, shared_processors};
use super::{FragmentError, OnboardingRequest};
use crate::k8s::resources::{COLLECTOR_CONFIG_FIELD, collector_type_meta};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use serde_json::json;
use std::collections::BTreeMap;

pub const MANAGED_BY: &str = "otel-pipeline-automation";

pub fn collector_name(service_name: &str) -> String {
    format!("{service_name}-otelcol")
}

/// Builds the dedicated collector resource for `request`, exporting to `loki_endpoint`.
pub fn collector_resource(
    generator: &FragmentGenerator,
    request: &OnboardingRequest,
    loki_endpoint: &str,
) -> Result<DynamicObject, FragmentError> {
    let fragment = generator.generate(request)?;
    let name = collector_name(&request.service_name);

    let mut processors = shared_processors();
    processors.insert("resource".to_string(), fragment.processor_spec);

    let config = json!({
        "receivers": {
            "otlp": {
                "protocols": {
                    "grpc": {"endpoint": "0.0.0.0:4317"},
                    "http": {"endpoint": "0.0.0.0:4318"},
                },
            },
        },
        "processors": processors,
        "exporters": {
            "loki": {
                "endpoint": loki_endpoint,
                "labels": {"attributes": fragment.exporter_labels},
            },
        },
        "service": {
            "pipelines": {
                "logs": {
                    "receivers": ["otlp"],
                    "processors": ["memory_limiter", "resource", "batch"],
                    "exporters": ["loki"],
                },
            },
        },
    });

    let labels = BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), name.clone()),
        (
            "app.kubernetes.io/component".to_string(),
            "opentelemetry-collector".to_string(),
        ),
        ("app.kubernetes.io/managed-by".to_string(), MANAGED_BY.to_string()),
        ("service".to_string(), request.service_name.clone()),
        ("team".to_string(), request.team.clone()),
    ]);

    Ok(DynamicObject {
        types: Some(collector_type_meta()),
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(request.namespace.clone()),
            labels: Some(labels),
            ..Default::default()
        },
        data: json!({
            "spec": {
                "mode": "deployment",
                "replicas": 1,
                COLLECTOR_CONFIG_FIELD: config,
                "resources": {
                    "limits": {"memory": "512Mi", "cpu": "500m"},
                    "requests": {"memory": "128Mi", "cpu": "100m"},
                },
            },
        }),
    })
}
