use super::{
    error::K8sError, labels::DefaultLabels, manifest::gvk, manifest::Manifest, AppliedObject,
    ClusterConnector, ClusterOps, PodReadiness,
};
use crate::access::ClusterAccessContext;
use crate::defaults::FIELD_MANAGER;
use k8s_openapi::api::core::v1::{Namespace, PersistentVolumeClaim, Pod};
use kube::{
    api::{Api, DeleteParams, Patch, PatchParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::{DynamicObject, ObjectMeta},
    discovery::{self, Scope},
    Client, Config,
};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::debug;

/// Provides a _sync_ implementation of [AsyncK8sClient].
///
/// Each method blocks on the shared runtime, so a case can drive the cluster from plain threads.
pub struct SyncK8sClient {
    async_client: AsyncK8sClient,
    runtime: Arc<Runtime>,
}

impl Debug for SyncK8sClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncK8sClient")
            .field("async_client", &self.async_client)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl SyncK8sClient {
    pub fn try_new(runtime: Arc<Runtime>, access: &ClusterAccessContext) -> Result<Self, K8sError> {
        Ok(Self {
            async_client: runtime.block_on(AsyncK8sClient::try_new(access))?,
            runtime,
        })
    }

}

/// Connects through [SyncK8sClient], all clients sharing one runtime.
#[derive(Debug, Clone)]
pub struct SyncK8sConnector {
    runtime: Arc<Runtime>,
}

impl SyncK8sConnector {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }
}

impl ClusterConnector for SyncK8sConnector {
    type Cluster = SyncK8sClient;

    fn connect(&self, access: &ClusterAccessContext) -> Result<SyncK8sClient, K8sError> {
        SyncK8sClient::try_new(Arc::clone(&self.runtime), access)
    }
}

impl ClusterOps for SyncK8sClient {
    fn create_namespace(&self, name: &str) -> Result<(), K8sError> {
        self.runtime
            .block_on(self.async_client.create_namespace(name))
    }

    fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
        self.runtime
            .block_on(self.async_client.delete_namespace(name))
    }

    fn apply_manifest(&self, manifest: &Manifest) -> Result<Vec<AppliedObject>, K8sError> {
        self.runtime
            .block_on(self.async_client.apply_manifest(manifest))
    }

    fn delete_objects(&self, objects: &[AppliedObject]) -> Result<(), K8sError> {
        self.runtime
            .block_on(self.async_client.delete_objects(objects))
    }

    fn claim_phase(&self, name: &str) -> Result<Option<String>, K8sError> {
        self.runtime.block_on(self.async_client.claim_phase(name))
    }

    fn pod_readiness(&self, name: &str) -> Result<PodReadiness, K8sError> {
        self.runtime.block_on(self.async_client.pod_readiness(name))
    }
}

pub struct AsyncK8sClient {
    client: Client,
    default_namespace: String,
}

impl Debug for AsyncK8sClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncK8sClient")
            .field("default_namespace", &self.default_namespace)
            .finish()
    }
}

impl AsyncK8sClient {
    /// Builds a client from the kubeconfig of the access context, never from the ambient
    /// `$KUBECONFIG`, so concurrent cases talk to their own cluster.
    pub async fn try_new(access: &ClusterAccessContext) -> Result<Self, K8sError> {
        debug!(kubeconfig = %access.kubeconfig().display(), "creating k8s client");
        let kubeconfig = Kubeconfig::read_from(access.kubeconfig())?;
        let options = KubeConfigOptions {
            context: access.context().map(ToString::to_string),
            ..Default::default()
        };
        let mut config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        config.default_namespace = access.namespace().to_string();

        let client = Client::try_from(config)?;
        debug!("client creation succeeded");

        Ok(Self {
            client,
            default_namespace: access.namespace().to_string(),
        })
    }

    pub async fn create_namespace(&self, name: &str) -> Result<(), K8sError> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(DefaultLabels::new().get()),
                ..Default::default()
            },
            ..Default::default()
        };
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces
            .create(&PostParams::default(), &namespace)
            .await?;
        debug!(namespace = name, "namespace created");
        Ok(())
    }

    pub async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        ignore_not_found(namespaces.delete(name, &DeleteParams::default()).await)?;
        debug!(namespace = name, "namespace deleted");
        Ok(())
    }

    /// Namespaced objects land in the client's default namespace, whatever the manifest says.
    pub async fn apply_manifest(&self, manifest: &Manifest) -> Result<Vec<AppliedObject>, K8sError> {
        let mut applied = Vec::with_capacity(manifest.objects().len());
        for object in manifest.objects() {
            let gvk = gvk(object).ok_or_else(|| K8sError::MissingKind(manifest.to_string()))?;
            let name = object
                .metadata
                .name
                .clone()
                .ok_or_else(|| K8sError::MissingName(manifest.to_string()))?;
            let (resource, capabilities) = discovery::pinned_kind(&self.client, &gvk).await?;

            let mut object = object.clone();
            let namespace = match capabilities.scope {
                Scope::Cluster => {
                    object.metadata.namespace = None;
                    None
                }
                Scope::Namespaced => {
                    object.metadata.namespace = Some(self.default_namespace.clone());
                    Some(self.default_namespace.clone())
                }
            };

            let api = self.dynamic_api(&resource, namespace.as_deref());
            api.patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&object),
            )
            .await?;
            debug!(kind = %resource.kind, %name, namespace = ?namespace, "object applied");

            applied.push(AppliedObject {
                resource,
                namespace,
                name,
            });
        }
        Ok(applied)
    }

    pub async fn delete_objects(&self, objects: &[AppliedObject]) -> Result<(), K8sError> {
        for object in objects.iter().rev() {
            let api = self.dynamic_api(&object.resource, object.namespace.as_deref());
            ignore_not_found(api.delete(&object.name, &DeleteParams::default()).await)?;
            debug!(kind = %object.resource.kind, name = %object.name, "object deleted");
        }
        Ok(())
    }

    pub async fn claim_phase(&self, name: &str) -> Result<Option<String>, K8sError> {
        let claims: Api<PersistentVolumeClaim> =
            Api::namespaced(self.client.clone(), &self.default_namespace);
        Ok(claims
            .get_opt(name)
            .await?
            .and_then(|claim| claim.status)
            .and_then(|status| status.phase))
    }

    pub async fn pod_readiness(&self, name: &str) -> Result<PodReadiness, K8sError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.default_namespace);
        let Some(status) = pods.get_opt(name).await?.and_then(|pod| pod.status) else {
            return Ok(PodReadiness::default());
        };
        let ready = status
            .conditions
            .unwrap_or_default()
            .iter()
            .any(|condition| condition.type_ == "Ready" && condition.status == "True");
        Ok(PodReadiness {
            phase: status.phase,
            ready,
        })
    }

    fn dynamic_api(
        &self,
        resource: &kube::discovery::ApiResource,
        namespace: Option<&str>,
    ) -> Api<DynamicObject> {
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

fn ignore_not_found<T>(result: Result<T, kube::Error>) -> Result<(), K8sError> {
    match result {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "NotFound".to_string(),
            code,
        })
    }

    #[test]
    fn not_found_is_ignored() {
        assert!(ignore_not_found::<()>(Err(api_error(404))).is_ok());
        assert!(ignore_not_found(Ok(())).is_ok());
        assert_matches!(
            ignore_not_found::<()>(Err(api_error(403))),
            Err(K8sError::Generic(_))
        );
    }

    #[test]
    fn pod_availability() {
        let running_ready = PodReadiness {
            phase: Some("Running".to_string()),
            ready: true,
        };
        assert!(running_ready.is_available());

        let pending = PodReadiness {
            phase: Some("Pending".to_string()),
            ready: false,
        };
        assert!(!pending.is_available());

        let running_not_ready = PodReadiness {
            phase: Some("Running".to_string()),
            ready: false,
        };
        assert!(!running_not_ready.is_available());
        assert!(!PodReadiness::default().is_available());
    }

    #[test]
    fn unreadable_kubeconfig() {
        let runtime = Arc::new(
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap(),
        );
        let dir = tempfile::tempdir().unwrap();
        let access = ClusterAccessContext::new(None, dir.path().join("kubeconfig"), "default");

        assert_matches!(
            SyncK8sConnector::new(runtime).connect(&access),
            Err(K8sError::UnableToSetupClientKubeconfig(_))
        );
    }
}
