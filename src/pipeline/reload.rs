//! Best effort nudge asking the collector workload to pick up a new configuration.
//!
//! Stamping the pod template with the current time makes the controller roll the pods. Nothing
//! here confirms the collector actually reloaded.
#[cfg_attr(test, mockall_double::double)]
use crate::k8s::client::SyncK8sClient;
use crate::k8s::error::K8sError;
use crate::k8s::resources::{daemonset_type_meta, deployment_type_meta};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

pub const RELOAD_ANNOTATION: &str = "config-reload-timestamp";
const DEFAULT_WORKLOAD_NAME: &str = "otel-collector";
const DEFAULT_WORKLOAD_NAMESPACE: &str = "observability";

#[derive(thiserror::Error, Debug)]
pub enum ReloadError {
    #[error("workload `{0}` not found")]
    NotFound(String),

    #[error("could not update workload: {0}")]
    Client(#[from] K8sError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum WorkloadKind {
    #[default]
    DaemonSet,
    Deployment,
}

impl WorkloadKind {
    fn kind(&self) -> String {
        match self {
            WorkloadKind::DaemonSet => daemonset_type_meta().kind,
            WorkloadKind::Deployment => deployment_type_meta().kind,
        }
    }
}

/// Workload running the collector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkloadRef {
    #[serde(default)]
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
}

impl Default for WorkloadRef {
    fn default() -> Self {
        Self {
            kind: WorkloadKind::default(),
            name: DEFAULT_WORKLOAD_NAME.to_string(),
            namespace: DEFAULT_WORKLOAD_NAMESPACE.to_string(),
        }
    }
}

impl Display for WorkloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind.kind(), self.namespace, self.name)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait ReloadSignal: Send + Sync {
    fn signal(&self, workload: &WorkloadRef) -> Result<(), ReloadError>;
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct ReloadTrigger {
    k8s_client: Arc<SyncK8sClient>,
    clock: Clock,
}

impl ReloadTrigger {
    pub fn new(k8s_client: Arc<SyncK8sClient>) -> Self {
        Self::with_clock(k8s_client, Box::new(Utc::now))
    }

    pub fn with_clock(k8s_client: Arc<SyncK8sClient>, clock: Clock) -> Self {
        Self { k8s_client, clock }
    }

    fn stamp(&self, template: &mut PodTemplateSpec) -> String {
        let timestamp = (self.clock)().to_rfc3339();
        template
            .metadata
            .get_or_insert_with(Default::default)
            .annotations
            .get_or_insert_with(Default::default)
            .insert(RELOAD_ANNOTATION.to_string(), timestamp.clone());
        timestamp
    }
}

impl ReloadSignal for ReloadTrigger {
    fn signal(&self, workload: &WorkloadRef) -> Result<(), ReloadError> {
        let not_found = || ReloadError::NotFound(workload.to_string());

        let timestamp = match workload.kind {
            WorkloadKind::DaemonSet => {
                let mut daemon_set = self
                    .k8s_client
                    .get_daemon_set(&workload.name, &workload.namespace)?
                    .ok_or_else(not_found)?;
                let spec = daemon_set.spec.get_or_insert_with(Default::default);
                let timestamp = self.stamp(&mut spec.template);
                self.k8s_client.replace_daemon_set(&daemon_set)?;
                timestamp
            }
            WorkloadKind::Deployment => {
                let mut deployment = self
                    .k8s_client
                    .get_deployment(&workload.name, &workload.namespace)?
                    .ok_or_else(not_found)?;
                let spec = deployment.spec.get_or_insert_with(Default::default);
                let timestamp = self.stamp(&mut spec.template);
                self.k8s_client.replace_deployment(&deployment)?;
                timestamp
            }
        };

        debug!(%timestamp, "reload requested for {workload}");
        Ok(())
    }
}
