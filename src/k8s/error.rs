use kube::config::KubeconfigError;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum K8sError {
    #[error("the kube client returned an error: `{0}`")]
    Generic(#[from] kube::Error),

    #[error("it is not possible to read kubeconfig: `{0}`")]
    UnableToSetupClientKubeconfig(#[from] KubeconfigError),

    #[error("error serializing/deserializing yaml: `{0}`")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("reading manifest `{path}`: {source}")]
    ReadManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing resource definition in `{0}`: apiVersion and kind are required")]
    MissingKind(String),

    #[error("missing metadata.name in `{0}`")]
    MissingName(String),
}
