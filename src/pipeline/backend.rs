//! Where the shared collector configuration lives.
//!
//! A backend hands out the parsed document together with the object it was read from. The object
//! keeps the `resourceVersion` of the read, so storing it back fails with a conflict if anybody
//! else wrote in between.
use crate::document::{DocumentError, DocumentStore, StructuredDocument, TextDocument};
#[cfg_attr(test, mockall_double::double)]
use crate::k8s::client::SyncK8sClient;
use crate::k8s::error::K8sError;
use crate::k8s::resources::{COLLECTOR_CONFIG_FIELD, collector_type_meta};
use crate::mutator::DuplicatePolicy;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::core::DynamicObject;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_CONFIGMAP_KEY: &str = "otel-collector-config.yaml";

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("`{0}` not found")]
    NotFound(String),

    #[error("`{object}` has no `{field}`")]
    MissingField { object: String, field: String },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    K8s(#[from] K8sError),
}

pub trait ConfigBackend: Display {
    type Document: DocumentStore;
    /// Object the document was read from, carrying its concurrency token.
    type Object;

    fn load(&self) -> Result<(Self::Document, Self::Object), BackendError>;

    /// Writes `document` into `object` and stores it, conditionally on the version `object` was
    /// read at.
    fn store(&self, document: Self::Document, object: Self::Object) -> Result<(), BackendError>;

    fn duplicate_policy(&self) -> DuplicatePolicy;
}

/// Text configuration stored under a key of a ConfigMap.
pub struct ConfigMapBackend {
    k8s_client: Arc<SyncK8sClient>,
    name: String,
    namespace: String,
    key: String,
}

impl ConfigMapBackend {
    pub fn new(k8s_client: Arc<SyncK8sClient>, name: String, namespace: String, key: String) -> Self {
        Self {
            k8s_client,
            name,
            namespace,
            key,
        }
    }
}

impl Display for ConfigMapBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configmap {}/{}", self.namespace, self.name)
    }
}

impl ConfigBackend for ConfigMapBackend {
    type Document = TextDocument;
    type Object = ConfigMap;

    fn load(&self) -> Result<(TextDocument, ConfigMap), BackendError> {
        let configmap = self
            .k8s_client
            .get_configmap(&self.name, &self.namespace)?
            .ok_or_else(|| BackendError::NotFound(self.to_string()))?;

        let text = configmap
            .data
            .as_ref()
            .and_then(|data| data.get(&self.key))
            .ok_or_else(|| BackendError::MissingField {
                object: self.to_string(),
                field: self.key.clone(),
            })?;
        debug!(
            resource_version = configmap.metadata.resource_version.as_deref().unwrap_or_default(),
            "loaded {self}"
        );

        Ok((TextDocument::parse(text), configmap))
    }

    fn store(&self, document: TextDocument, mut configmap: ConfigMap) -> Result<(), BackendError> {
        configmap
            .data
            .get_or_insert_with(BTreeMap::default)
            .insert(self.key.clone(), document.to_string());
        self.k8s_client.replace_configmap(&configmap)?;
        Ok(())
    }

    fn duplicate_policy(&self) -> DuplicatePolicy {
        DuplicatePolicy::Skip
    }
}

/// Structured configuration held by an `OpenTelemetryCollector` resource.
pub struct CollectorResourceBackend {
    k8s_client: Arc<SyncK8sClient>,
    name: String,
    namespace: String,
}

impl CollectorResourceBackend {
    pub fn new(k8s_client: Arc<SyncK8sClient>, name: String, namespace: String) -> Self {
        Self {
            k8s_client,
            name,
            namespace,
        }
    }
}

impl Display for CollectorResourceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}/{}",
            collector_type_meta().kind,
            self.namespace,
            self.name
        )
    }
}

impl ConfigBackend for CollectorResourceBackend {
    type Document = StructuredDocument;
    type Object = DynamicObject;

    fn load(&self) -> Result<(StructuredDocument, DynamicObject), BackendError> {
        let obj = self
            .k8s_client
            .get_dynamic_object(&collector_type_meta(), &self.name, &self.namespace)?
            .ok_or_else(|| BackendError::NotFound(self.to_string()))?;

        let config = obj
            .data
            .get("spec")
            .and_then(|spec| spec.get(COLLECTOR_CONFIG_FIELD))
            .cloned()
            .ok_or_else(|| self.missing_config())?;

        Ok((StructuredDocument::try_from(config)?, obj))
    }

    fn store(&self, document: StructuredDocument, mut obj: DynamicObject) -> Result<(), BackendError> {
        obj.data
            .get_mut("spec")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| self.missing_config())?
            .insert(COLLECTOR_CONFIG_FIELD.to_string(), document.into());
        self.k8s_client.replace_dynamic_object(&obj)?;
        Ok(())
    }

    fn duplicate_policy(&self) -> DuplicatePolicy {
        DuplicatePolicy::Reject
    }
}

impl CollectorResourceBackend {
    fn missing_config(&self) -> BackendError {
        BackendError::MissingField {
            object: self.to_string(),
            field: format!("spec.{COLLECTOR_CONFIG_FIELD}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::document::Section;
    use crate::k8s::client::MockSyncK8sClient;
    use assert_matches::assert_matches;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use mockall::predicate;
    use serde_json::json;

    pub(crate) const NAMESPACE: &str = "observability";
    pub(crate) const CONFIGMAP: &str = "otel-collector-config";

    pub(crate) fn configmap(text: &str, resource_version: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(CONFIGMAP.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                resource_version: Some(resource_version.to_string()),
                labels: Some(BTreeMap::from([(
                    "app".to_string(),
                    "otel-collector".to_string(),
                )])),
                ..Default::default()
            },
            data: Some(BTreeMap::from([
                (DEFAULT_CONFIGMAP_KEY.to_string(), text.to_string()),
                ("other.yaml".to_string(), "untouched".to_string()),
            ])),
            ..Default::default()
        }
    }

    pub(crate) fn configmap_backend(k8s_client: MockSyncK8sClient) -> ConfigMapBackend {
        ConfigMapBackend::new(
            Arc::new(k8s_client),
            CONFIGMAP.to_string(),
            NAMESPACE.to_string(),
            DEFAULT_CONFIGMAP_KEY.to_string(),
        )
    }

    fn collector(config: Value) -> DynamicObject {
        DynamicObject {
            types: Some(collector_type_meta()),
            metadata: ObjectMeta {
                name: Some("shared".to_string()),
                namespace: Some(NAMESPACE.to_string()),
                resource_version: Some("7".to_string()),
                ..Default::default()
            },
            data: json!({"spec": {"mode": "daemonset", "config": config}}),
        }
    }

    #[test]
    fn test_configmap_load_and_store() {
        let mut k8s_client = MockSyncK8sClient::default();
        k8s_client
            .expect_get_configmap()
            .once()
            .with(predicate::eq(CONFIGMAP), predicate::eq(NAMESPACE))
            .returning(|_, _| Ok(Some(configmap("receivers:\n  otlp: {}\n", "42"))));
        k8s_client
            .expect_replace_configmap()
            .once()
            .withf(|cm| {
                let data = cm.data.as_ref().unwrap();
                cm.metadata.resource_version.as_deref() == Some("42")
                    && data[DEFAULT_CONFIGMAP_KEY] == "receivers:\n  otlp: {}\n  filelog/a: {}\n"
                    && data["other.yaml"] == "untouched"
            })
            .returning(|cm| Ok(cm.clone()));

        let backend = configmap_backend(k8s_client);
        let (mut document, cm) = backend.load().unwrap();
        document
            .insert_block(Section::Receivers, "filelog/a", &json!({}))
            .unwrap();
        backend.store(document, cm).unwrap();
    }

    #[test]
    fn test_configmap_load_errors() {
        let mut k8s_client = MockSyncK8sClient::default();
        k8s_client
            .expect_get_configmap()
            .once()
            .returning(|_, _| Ok(None));
        assert_matches!(
            configmap_backend(k8s_client).load(),
            Err(BackendError::NotFound(object)) if object == "configmap observability/otel-collector-config"
        );

        let mut k8s_client = MockSyncK8sClient::default();
        k8s_client.expect_get_configmap().once().returning(|_, _| {
            let mut cm = configmap("", "1");
            cm.data = None;
            Ok(Some(cm))
        });
        assert_matches!(
            configmap_backend(k8s_client).load(),
            Err(BackendError::MissingField { field, .. }) if field == DEFAULT_CONFIGMAP_KEY
        );

        let mut k8s_client = MockSyncK8sClient::default();
        k8s_client
            .expect_get_configmap()
            .once()
            .returning(|_, _| Err(K8sError::KubeRs(Box::new(kube::Error::TlsRequired))));
        assert_matches!(
            configmap_backend(k8s_client).load(),
            Err(BackendError::K8s(K8sError::KubeRs(_)))
        );
    }

    #[test]
    fn test_configmap_store_conflict() {
        let mut k8s_client = MockSyncK8sClient::default();
        k8s_client
            .expect_replace_configmap()
            .once()
            .returning(|_| Err(K8sError::Conflict(CONFIGMAP.to_string())));

        assert_matches!(
            configmap_backend(k8s_client).store(TextDocument::parse(""), configmap("", "1")),
            Err(BackendError::K8s(K8sError::Conflict(_)))
        );
    }

    #[test]
    fn test_collector_resource_load_and_store() {
        let mut k8s_client = MockSyncK8sClient::default();
        k8s_client
            .expect_get_dynamic_object()
            .once()
            .with(
                predicate::eq(collector_type_meta()),
                predicate::eq("shared"),
                predicate::eq(NAMESPACE),
            )
            .returning(|_, _, _| Ok(Some(collector(json!({"receivers": {"otlp": {}}})))));
        k8s_client
            .expect_replace_dynamic_object()
            .once()
            .withf(|obj| {
                obj.metadata.resource_version.as_deref() == Some("7")
                    && obj.data["spec"]["mode"] == "daemonset"
                    && obj.data["spec"]["config"]["receivers"]
                        == json!({"otlp": {}, "filelog/a": {"start_at": "end"}})
            })
            .returning(|obj| Ok(obj.clone()));

        let backend = CollectorResourceBackend::new(
            Arc::new(k8s_client),
            "shared".to_string(),
            NAMESPACE.to_string(),
        );
        assert_eq!(backend.duplicate_policy(), DuplicatePolicy::Reject);

        let (mut document, obj) = backend.load().unwrap();
        document
            .insert_block(Section::Receivers, "filelog/a", &json!({"start_at": "end"}))
            .unwrap();
        backend.store(document, obj).unwrap();
    }

    #[test]
    fn test_collector_resource_without_config() {
        let mut k8s_client = MockSyncK8sClient::default();
        k8s_client
            .expect_get_dynamic_object()
            .once()
            .returning(|_, _, _| {
                let mut obj = collector(Value::Null);
                obj.data = json!({"spec": {"mode": "daemonset"}});
                Ok(Some(obj))
            });

        let backend = CollectorResourceBackend::new(
            Arc::new(k8s_client),
            "shared".to_string(),
            NAMESPACE.to_string(),
        );
        assert_matches!(
            backend.load(),
            Err(BackendError::MissingField { field, .. }) if field == "spec.config"
        );
    }
}
