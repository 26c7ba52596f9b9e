use kube::config::KubeconfigError;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum K8sError {
    #[error("the kube client returned an error: `{0}`")]
    KubeRs(#[from] Box<kube::Error>),

    #[error("it is not possible to read kubeconfig: `{0}`")]
    UnableToSetupClientKubeconfig(#[from] KubeconfigError),

    #[error("`{0}` was modified since it was read")]
    Conflict(String),

    #[error("`{0}` not found")]
    NotFound(String),

    #[error("operation did not complete within {0:?}")]
    Timeout(Duration),

    #[error("invalid type meta `{0}`")]
    InvalidTypeMeta(String),

    #[error("missing field `{0}`")]
    MissingField(String),
}

impl From<kube::Error> for K8sError {
    fn from(err: kube::Error) -> Self {
        K8sError::KubeRs(Box::new(err))
    }
}

impl K8sError {
    /// Maps write errors, turning rejected preconditions into [K8sError::Conflict].
    pub(super) fn from_write(err: kube::Error, name: &str) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 409 => {
                K8sError::Conflict(name.to_string())
            }
            kube::Error::Api(response) if response.code == 404 => {
                K8sError::NotFound(name.to_string())
            }
            err => err.into(),
        }
    }
}
