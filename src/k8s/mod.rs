pub mod client;
pub mod error;
pub mod labels;
pub mod manifest;

pub use error::K8sError;

use crate::access::ClusterAccessContext;
use kube::discovery::ApiResource;
use manifest::Manifest;

/// Reference to an object created by an apply, enough to delete it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedObject {
    pub resource: ApiResource,
    pub namespace: Option<String>,
    pub name: String,
}

/// Readiness related fields of a pod status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodReadiness {
    pub phase: Option<String>,
    pub ready: bool,
}

impl PodReadiness {
    pub fn is_available(&self) -> bool {
        self.ready && self.phase.as_deref() == Some("Running")
    }
}

/// Cluster operations the checks rely on. Namespaced calls use the client's default namespace.
#[cfg_attr(test, mockall::automock)]
pub trait ClusterOps {
    fn create_namespace(&self, name: &str) -> Result<(), K8sError>;

    /// Deletes the namespace, a missing namespace is not an error.
    fn delete_namespace(&self, name: &str) -> Result<(), K8sError>;

    /// Server-side applies every object in the manifest.
    fn apply_manifest(&self, manifest: &Manifest) -> Result<Vec<AppliedObject>, K8sError>;

    /// Deletes the objects in reverse order, missing objects are skipped.
    fn delete_objects(&self, objects: &[AppliedObject]) -> Result<(), K8sError>;

    /// Phase of the claim, `None` when the claim or its status does not exist yet.
    fn claim_phase(&self, name: &str) -> Result<Option<String>, K8sError>;

    fn pod_readiness(&self, name: &str) -> Result<PodReadiness, K8sError>;
}

/// Builds cluster clients for an access context.
pub trait ClusterConnector {
    type Cluster: ClusterOps;

    fn connect(&self, access: &ClusterAccessContext) -> Result<Self::Cluster, K8sError>;
}
