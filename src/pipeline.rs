//! Read-modify-write cycles against the cluster.
//!
//! Each [manager::PipelineManager] call loads the shared configuration through a
//! [backend::ConfigBackend], mutates it in memory, writes it back conditionally on the version that
//! was read and finally nudges the collector workload through the [reload] trigger.
pub mod backend;
pub mod manager;
pub mod reload;

pub use manager::{PipelineManager, ServicePipelines};

use crate::document::DocumentError;
use crate::fragment::FragmentError;
use crate::k8s::error::K8sError;
use crate::mutator::MutationError;
use backend::BackendError;
use reload::ReloadError;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidRequest(#[from] FragmentError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("`{0}` was modified concurrently, the operation must be retried")]
    ConflictRetryable(String),

    #[error("`{0}` not found")]
    NotFound(String),

    #[error("backing store unavailable: {0}")]
    StoreUnavailable(#[source] K8sError),

    #[error("stored configuration is not valid: {0}")]
    Document(#[from] DocumentError),

    #[error("configuration committed but the reload signal failed: {0}")]
    Reload(#[from] ReloadError),
}

impl PipelineError {
    /// Whether running the whole cycle again, with a fresh read, may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::ConflictRetryable(_))
    }
}

impl From<BackendError> for PipelineError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(object) => PipelineError::NotFound(object),
            BackendError::MissingField { field, .. } => {
                PipelineError::Mutation(MutationError::MalformedDocument { anchor: field })
            }
            BackendError::Document(err) => PipelineError::Document(err),
            BackendError::K8s(K8sError::Conflict(object)) => {
                PipelineError::ConflictRetryable(object)
            }
            BackendError::K8s(K8sError::NotFound(object)) => PipelineError::NotFound(object),
            BackendError::K8s(err) => PipelineError::StoreUnavailable(err),
        }
    }
}
