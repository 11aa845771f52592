//! Storage addon check: a claim provisioned by the EBS CSI driver gets bound and a pod mounting it
//! becomes ready.
pub mod error;
pub mod fixtures;

pub use error::VerifierError;

use crate::access::ClusterAccessContext;
use crate::cleanup::CleanupStack;
use crate::k8s::{ClusterOps, K8sError};
use crate::poll::{PollError, Poller, Sleeper};
use fixtures::StorageFixtures;
use std::cell::Cell;
use tracing::info;

/// Progress of a storage check. States are only ever visited in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageCheckState {
    Pending,
    NamespaceCreated,
    StorageClassApplied,
    WorkloadApplied,
    ClaimBound,
    PodReady,
    Done,
}

pub struct StorageCheck<'a, S> {
    fixtures: &'a StorageFixtures,
    poller: &'a Poller<S>,
    namespace: String,
    state: Cell<StorageCheckState>,
}

impl<'a, S: Sleeper> StorageCheck<'a, S> {
    pub fn new(
        fixtures: &'a StorageFixtures,
        poller: &'a Poller<S>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            fixtures,
            poller,
            namespace: namespace.into(),
            state: Cell::new(StorageCheckState::Pending),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Last state reached, also after a failure.
    pub fn state(&self) -> StorageCheckState {
        self.state.get()
    }

    /// Runs the check. `connect` builds a client for an access context: it is called with
    /// `access` for cluster-scoped objects and with `access` scoped to the disposable namespace
    /// for the claim and the pod.
    ///
    /// The namespace and the storage class are deleted on every exit path; failures doing so are
    /// logged only.
    pub fn run<C, F>(&self, access: &ClusterAccessContext, mut connect: F) -> Result<(), VerifierError>
    where
        C: ClusterOps,
        F: FnMut(&ClusterAccessContext) -> Result<C, K8sError>,
    {
        let cluster = connect(access).map_err(VerifierError::Connect)?;
        let cluster = &cluster;
        let mut cleanups = CleanupStack::new();

        cluster
            .create_namespace(&self.namespace)
            .map_err(|source| VerifierError::CreateNamespace {
                namespace: self.namespace.clone(),
                source,
            })?;
        let namespace = self.namespace.as_str();
        cleanups.defer(format!("namespace {namespace}"), move || {
            cluster.delete_namespace(namespace)
        });
        self.transition(StorageCheckState::NamespaceCreated);

        let storage_class = cluster
            .apply_manifest(&self.fixtures.storage_class)
            .map_err(|source| VerifierError::apply(&self.fixtures.storage_class, source))?;
        cleanups.defer(
            format!("storage class {}", self.fixtures.storage_class),
            move || cluster.delete_objects(&storage_class),
        );
        self.transition(StorageCheckState::StorageClassApplied);

        let scoped = connect(&access.with_namespace(namespace)).map_err(VerifierError::Connect)?;
        for manifest in [&self.fixtures.claim, &self.fixtures.pod] {
            scoped
                .apply_manifest(manifest)
                .map_err(|source| VerifierError::apply(manifest, source))?;
        }
        self.transition(StorageCheckState::WorkloadApplied);

        let claim = self.fixtures.claim_name.as_str();
        self.poller
            .until(&format!("claim {claim} bound"), || {
                match scoped.claim_phase(claim) {
                    Ok(Some(phase)) if phase == "Bound" => Ok(()),
                    Ok(Some(phase)) => Err(format!("claim phase is {phase}")),
                    Ok(None) => Err("claim has no status yet".to_string()),
                    Err(err) => Err(err.to_string()),
                }
            })
            .map_err(|err| match err {
                PollError::Exhausted {
                    attempts,
                    last_error,
                    ..
                } => VerifierError::VolumeNotBound {
                    claim: claim.to_string(),
                    attempts,
                    last_error,
                },
                PollError::Cancelled { .. } => VerifierError::Cancelled(err.to_string()),
            })?;
        self.transition(StorageCheckState::ClaimBound);

        let pod = self.fixtures.pod_name.as_str();
        self.poller
            .until(&format!("pod {pod} ready"), || match scoped.pod_readiness(pod) {
                Ok(readiness) if readiness.is_available() => Ok(()),
                Ok(readiness) => Err(format!(
                    "pod phase is {}, ready: {}",
                    readiness.phase.as_deref().unwrap_or("unknown"),
                    readiness.ready
                )),
                Err(err) => Err(err.to_string()),
            })
            .map_err(|err| match err {
                PollError::Exhausted {
                    attempts,
                    last_error,
                    ..
                } => VerifierError::PodNotReady {
                    pod: pod.to_string(),
                    attempts,
                    last_error,
                },
                PollError::Cancelled { .. } => VerifierError::Cancelled(err.to_string()),
            })?;
        self.transition(StorageCheckState::PodReady);

        cleanups.release_all();
        self.transition(StorageCheckState::Done);
        Ok(())
    }

    fn transition(&self, state: StorageCheckState) {
        info!(namespace = %self.namespace, ?state, "storage check progressed");
        self.state.set(state);
    }
}
