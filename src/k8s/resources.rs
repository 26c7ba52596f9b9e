use kube::core::TypeMeta;

/// Field of the collector resource `spec` holding the collector configuration.
pub const COLLECTOR_CONFIG_FIELD: &str = "config";

pub fn collector_type_meta() -> TypeMeta {
    TypeMeta {
        api_version: "opentelemetry.io/v1beta1".to_string(),
        kind: "OpenTelemetryCollector".to_string(),
    }
}

pub fn daemonset_type_meta() -> TypeMeta {
    TypeMeta {
        api_version: "apps/v1".to_string(),
        kind: "DaemonSet".to_string(),
    }
}

pub fn deployment_type_meta() -> TypeMeta {
    TypeMeta {
        api_version: "apps/v1".to_string(),
        kind: "Deployment".to_string(),
    }
}
