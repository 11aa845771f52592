use super::error::K8sError;
use kube::core::{DynamicObject, GroupVersionKind};
use serde::Deserialize;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Objects parsed from a (possibly multi-document) yaml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    source: PathBuf,
    objects: Vec<DynamicObject>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self, K8sError> {
        let content = std::fs::read_to_string(path).map_err(|source| K8sError::ReadManifest {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(path.to_path_buf(), &content)
    }

    pub fn from_yaml(source: PathBuf, content: &str) -> Result<Self, K8sError> {
        let mut objects = Vec::new();
        for document in serde_yaml::Deserializer::from_str(content) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            let object: DynamicObject = serde_yaml::from_value(value)?;
            if object.metadata.name.is_none() {
                return Err(K8sError::MissingName(source.display().to_string()));
            }
            gvk(&object).ok_or_else(|| K8sError::MissingKind(source.display().to_string()))?;
            objects.push(object);
        }
        Ok(Self { source, objects })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn objects(&self) -> &[DynamicObject] {
        &self.objects
    }

    /// Name of the first object, the one the checks wait on.
    pub fn primary_name(&self) -> Option<&str> {
        self.objects
            .first()
            .and_then(|object| object.metadata.name.as_deref())
    }
}

impl Display for Manifest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source.display())
    }
}

pub fn gvk(object: &DynamicObject) -> Option<GroupVersionKind> {
    let types = object.types.as_ref()?;
    if types.api_version.is_empty() || types.kind.is_empty() {
        return None;
    }
    let (group, version) = types
        .api_version
        .split_once('/')
        .unwrap_or(("", types.api_version.as_str()));
    Some(GroupVersionKind::gvk(group, version, &types.kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_multi_document_manifests() {
        let manifest = Manifest::from_yaml(
            PathBuf::from("inline.yaml"),
            r#"
---
apiVersion: storage.k8s.io/v1
kind: StorageClass
metadata:
  name: ebs-csi-test-sc
provisioner: ebs.csi.aws.com
---
apiVersion: v1
kind: PersistentVolumeClaim
metadata:
  name: ebs-csi-test-pvc
  namespace: ebs-csi-test
spec:
  accessModes: ["ReadWriteOnce"]
"#,
        )
        .unwrap();

        assert_eq!(manifest.objects().len(), 2);
        assert_eq!(manifest.primary_name(), Some("ebs-csi-test-sc"));

        let storage_class = gvk(&manifest.objects()[0]).unwrap();
        assert_eq!(storage_class.group, "storage.k8s.io");
        assert_eq!(storage_class.version, "v1");
        assert_eq!(storage_class.kind, "StorageClass");

        let claim = gvk(&manifest.objects()[1]).unwrap();
        assert_eq!(claim.group, "");
        assert_eq!(claim.version, "v1");
        assert_eq!(claim.kind, "PersistentVolumeClaim");
    }

    #[test]
    fn rejects_objects_without_name() {
        assert_matches!(
            Manifest::from_yaml(
                PathBuf::from("pod.yaml"),
                "apiVersion: v1\nkind: Pod\nmetadata:\n  labels:\n    app: test\n"
            ),
            Err(K8sError::MissingName(source)) => assert_eq!(source, "pod.yaml")
        );
    }

    #[test]
    fn rejects_objects_without_kind() {
        assert_matches!(
            Manifest::from_yaml(
                PathBuf::from("pod.yaml"),
                "apiVersion: v1\nmetadata:\n  name: test\n"
            ),
            Err(K8sError::MissingKind(_)) | Err(K8sError::SerdeYaml(_))
        );
    }

    #[test]
    fn reads_fixture_files() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/ebs-csi");
        for (file, name) in [
            ("storageclass.yaml", "ebs-csi-test-sc"),
            ("pvc.yaml", "ebs-csi-test-pvc"),
            ("pod.yaml", "ebs-csi-test-pod"),
        ] {
            let manifest = Manifest::from_file(&fixtures.join(file)).unwrap();
            assert_eq!(manifest.primary_name(), Some(name));
        }
    }

    #[test]
    fn missing_file() {
        assert_matches!(
            Manifest::from_file(Path::new("does/not/exist.yaml")),
            Err(K8sError::ReadManifest { .. })
        );
    }
}
