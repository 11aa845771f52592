use super::error::VerifierError;
use crate::defaults::{CLAIM_FIXTURE, POD_FIXTURE, STORAGE_CLASS_FIXTURE};
use crate::k8s::manifest::Manifest;
use std::path::Path;

/// Manifests of the storage check.
#[derive(Debug, Clone)]
pub struct StorageFixtures {
    pub storage_class: Manifest,
    pub claim: Manifest,
    pub pod: Manifest,
    pub claim_name: String,
    pub pod_name: String,
}

impl StorageFixtures {
    pub fn load(dir: &Path) -> Result<Self, VerifierError> {
        let load = |file: &str| Manifest::from_file(&dir.join(file)).map_err(VerifierError::Fixtures);
        let storage_class = load(STORAGE_CLASS_FIXTURE)?;
        let claim = load(CLAIM_FIXTURE)?;
        let pod = load(POD_FIXTURE)?;

        let claim_name = primary_name(&claim)?;
        let pod_name = primary_name(&pod)?;
        if storage_class.objects().is_empty() {
            return Err(VerifierError::InvalidFixture(
                storage_class.to_string(),
                "no objects".to_string(),
            ));
        }

        Ok(Self {
            storage_class,
            claim,
            pod,
            claim_name,
            pod_name,
        })
    }
}

fn primary_name(manifest: &Manifest) -> Result<String, VerifierError> {
    manifest
        .primary_name()
        .map(ToString::to_string)
        .ok_or_else(|| VerifierError::InvalidFixture(manifest.to_string(), "no objects".to_string()))
}
