use super::error::K8sError;
use duration_str::deserialize_duration;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::PostParams;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind, TypeMeta};
use kube::{Api, Client, Config, Resource, config::KubeConfigOptions};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

/// Provides a _sync_ implementation of [AsyncK8sClient].
///
/// Each method blocks on the corresponding async call using the held runtime, which lets the
/// pipeline engine stay synchronous end to end.
pub struct SyncK8sClient {
    async_client: AsyncK8sClient,
    runtime: Arc<Runtime>,
}

impl Debug for SyncK8sClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncK8sClient")
            .field("async_client", &"AsyncK8sClient implementation")
            .field("runtime", &self.runtime)
            .finish()
    }
}

#[cfg_attr(test, mockall::automock)]
impl SyncK8sClient {
    pub fn try_new(runtime: Arc<Runtime>, config: &ClientConfig) -> Result<Self, K8sError> {
        Ok(Self {
            async_client: runtime.block_on(AsyncK8sClient::try_new(config))?,
            runtime,
        })
    }

    pub fn get_configmap(&self, name: &str, namespace: &str) -> Result<Option<ConfigMap>, K8sError> {
        self.runtime
            .block_on(self.async_client.get_configmap(name, namespace))
    }

    pub fn replace_configmap(&self, configmap: &ConfigMap) -> Result<ConfigMap, K8sError> {
        self.runtime
            .block_on(self.async_client.replace_configmap(configmap))
    }

    pub fn get_dynamic_object(
        &self,
        tm: &TypeMeta,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DynamicObject>, K8sError> {
        self.runtime
            .block_on(self.async_client.get_dynamic_object(tm, name, namespace))
    }

    pub fn replace_dynamic_object(&self, obj: &DynamicObject) -> Result<DynamicObject, K8sError> {
        self.runtime
            .block_on(self.async_client.replace_dynamic_object(obj))
    }

    pub fn get_daemon_set(&self, name: &str, namespace: &str) -> Result<Option<DaemonSet>, K8sError> {
        self.runtime
            .block_on(self.async_client.get_daemon_set(name, namespace))
    }

    pub fn replace_daemon_set(&self, daemon_set: &DaemonSet) -> Result<DaemonSet, K8sError> {
        self.runtime
            .block_on(self.async_client.replace_daemon_set(daemon_set))
    }

    pub fn get_deployment(&self, name: &str, namespace: &str) -> Result<Option<Deployment>, K8sError> {
        self.runtime
            .block_on(self.async_client.get_deployment(name, namespace))
    }

    pub fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, K8sError> {
        self.runtime
            .block_on(self.async_client.replace_deployment(deployment))
    }
}

/// Same as upstream kube-rs default client timeout (read/write).
const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(295);
/// Upper bound of a whole request against the api-server, retries of the underlying stack included.
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Read and write timeout of the underlying connection.
    #[serde(
        default = "default_client_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub client_timeout: Duration,
    /// Maximum time a single get or replace may take.
    #[serde(
        default = "default_operation_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub operation_timeout: Duration,
}

fn default_client_timeout() -> Duration {
    DEFAULT_CLIENT_TIMEOUT
}

fn default_operation_timeout() -> Duration {
    DEFAULT_OPERATION_TIMEOUT
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

pub struct AsyncK8sClient {
    client: Client,
    operation_timeout: Duration,
}

impl AsyncK8sClient {
    /// Constructs a new Kubernetes client.
    ///
    /// If loading from the inCluster config fail we fall back to kube-config
    /// This will respect the `$KUBECONFIG` envvar, but otherwise default to `~/.kube/config`.
    pub async fn try_new(client_config: &ClientConfig) -> Result<Self, K8sError> {
        debug!("trying inClusterConfig for k8s client");

        let mut config = match Config::incluster() {
            Ok(c) => c,
            Err(e) => {
                debug!("inClusterConfig {}, trying kubeconfig for k8s client", e);
                let c = KubeConfigOptions::default();
                Config::from_kubeconfig(&c).await?
            }
        };
        config.read_timeout = Some(client_config.client_timeout);
        config.write_timeout = Some(client_config.client_timeout);

        let client = Client::try_from(config)?;

        debug!("k8s client initialization succeeded");
        Ok(Self::new(client, client_config.operation_timeout))
    }

    pub fn new(client: Client, operation_timeout: Duration) -> Self {
        Self {
            client,
            operation_timeout,
        }
    }

    pub async fn get_configmap(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ConfigMap>, K8sError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(get_opt(&api, name)).await
    }

    pub async fn replace_configmap(&self, configmap: &ConfigMap) -> Result<ConfigMap, K8sError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace_of(configmap)?);
        self.bounded(replace(&api, configmap)).await
    }

    pub async fn get_dynamic_object(
        &self,
        tm: &TypeMeta,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DynamicObject>, K8sError> {
        let api = dynamic_api(self.client.clone(), tm, namespace)?;
        self.bounded(get_opt(&api, name)).await
    }

    pub async fn replace_dynamic_object(
        &self,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, K8sError> {
        let tm = obj
            .types
            .as_ref()
            .ok_or_else(|| K8sError::MissingField("types".to_string()))?;
        let api = dynamic_api(self.client.clone(), tm, namespace_of(obj)?)?;
        self.bounded(replace(&api, obj)).await
    }

    pub async fn get_daemon_set(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DaemonSet>, K8sError> {
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(get_opt(&api, name)).await
    }

    pub async fn replace_daemon_set(&self, daemon_set: &DaemonSet) -> Result<DaemonSet, K8sError> {
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace_of(daemon_set)?);
        self.bounded(replace(&api, daemon_set)).await
    }

    pub async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>, K8sError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(get_opt(&api, name)).await
    }

    pub async fn replace_deployment(
        &self,
        deployment: &Deployment,
    ) -> Result<Deployment, K8sError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace_of(deployment)?);
        self.bounded(replace(&api, deployment)).await
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, K8sError>>,
    ) -> Result<T, K8sError> {
        tokio::time::timeout(self.operation_timeout, operation)
            .await
            .map_err(|_| K8sError::Timeout(self.operation_timeout))?
    }
}

//  get_opt and replace are kept outside the client to be able to use mockall in the client
//  without having to make K 'static.
async fn get_opt<K>(api: &Api<K>, name: &str) -> Result<Option<K>, K8sError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let obj = api.get_opt(name).await?;
    if obj.is_none() {
        debug!("{} not found", name);
    }
    Ok(obj)
}

/// Writes `obj` back. The api-server rejects the write when the `resourceVersion` carried by
/// `obj` is stale.
async fn replace<K>(api: &Api<K>, obj: &K) -> Result<K, K8sError>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    let name = obj
        .meta()
        .name
        .as_deref()
        .ok_or_else(|| K8sError::MissingField("metadata.name".to_string()))?;

    api.replace(name, &PostParams::default(), obj)
        .await
        .map_err(|err| K8sError::from_write(err, name))
}

fn namespace_of<K: Resource>(obj: &K) -> Result<&str, K8sError> {
    obj.meta()
        .namespace
        .as_deref()
        .ok_or_else(|| K8sError::MissingField("metadata.namespace".to_string()))
}

fn dynamic_api(
    client: Client,
    tm: &TypeMeta,
    namespace: &str,
) -> Result<Api<DynamicObject>, K8sError> {
    let gvk = gvk_from_type_meta(tm)?;
    Ok(Api::namespaced_with(
        client,
        namespace,
        &ApiResource::from_gvk(&gvk),
    ))
}

fn gvk_from_type_meta(tm: &TypeMeta) -> Result<GroupVersionKind, K8sError> {
    let (group, version) = match tm.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", tm.api_version.as_str()),
    };
    if version.is_empty() || tm.kind.is_empty() {
        return Err(K8sError::InvalidTypeMeta(format!(
            "{}/{}",
            tm.api_version, tm.kind
        )));
    }
    Ok(GroupVersionKind::gvk(group, version, &tm.kind))
}
