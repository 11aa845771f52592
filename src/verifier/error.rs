use crate::k8s::{manifest::Manifest, K8sError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("loading fixtures: {0}")]
    Fixtures(#[source] K8sError),

    #[error("invalid fixture `{0}`: {1}")]
    InvalidFixture(String, String),

    #[error("connecting to the cluster: {0}")]
    Connect(#[source] K8sError),

    #[error("creating namespace `{namespace}`: {source}")]
    CreateNamespace {
        namespace: String,
        #[source]
        source: K8sError,
    },

    #[error("applying `{manifest}`: {source}")]
    Apply {
        manifest: String,
        #[source]
        source: K8sError,
    },

    #[error("claim `{claim}` not bound after {attempts} attempts: {last_error}")]
    VolumeNotBound {
        claim: String,
        attempts: usize,
        last_error: String,
    },

    #[error("pod `{pod}` not ready after {attempts} attempts: {last_error}")]
    PodNotReady {
        pod: String,
        attempts: usize,
        last_error: String,
    },

    #[error("storage check cancelled: {0}")]
    Cancelled(String),
}

impl VerifierError {
    pub(super) fn apply(manifest: &Manifest, source: K8sError) -> Self {
        Self::Apply {
            manifest: manifest.to_string(),
            source,
        }
    }
}
