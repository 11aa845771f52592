use super::error::ProvisionerError;
use crate::config::merge::merge;
use crate::defaults::OVERRIDE_FILE_NAME;
use serde_json::{json, Value};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Builds the Terraform override document for the example's `cluster` module.
///
/// `extra` is layered first, then the settings the cluster checks depend on: the API endpoint
/// must be reachable from the runner and the identity applying the stack must be cluster admin.
pub fn override_document(extra: &Value) -> Value {
    let mut document = json!({ "module": { "cluster": {} } });
    merge(&mut document, extra.clone());
    merge(
        &mut document,
        json!({
            "module": {
                "cluster": {
                    "endpoint_public_access": true,
                    "enable_cluster_creator_admin_permissions": true,
                }
            }
        }),
    );
    document
}

/// Override file living in an example directory. It is removed when dropped.
#[derive(Debug)]
pub struct OverrideFile {
    path: PathBuf,
}

impl OverrideFile {
    pub fn write(example_dir: &Path, document: &Value) -> Result<Self, ProvisionerError> {
        let data = serde_json::to_string_pretty(document)?;
        let path = example_dir.join(OVERRIDE_FILE_NAME);

        // a leftover file would keep its permissions
        match fs::remove_file(&path) {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                return Err(ProvisionerError::WriteOverride { path, source: err });
            }
            _ => {}
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(target_family = "unix")]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        options
            .open(&path)
            .and_then(|mut file| file.write_all(data.as_bytes()))
            .map_err(|source| ProvisionerError::WriteOverride {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "override file written");

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OverrideFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "override file removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), %err, "removing override file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_settings_win_over_extra() {
        let document = override_document(&json!({
            "module": {
                "cluster": {
                    "endpoint_public_access": false,
                    "cluster_version": "1.30"
                }
            }
        }));

        assert_eq!(
            document,
            json!({
                "module": {
                    "cluster": {
                        "endpoint_public_access": true,
                        "enable_cluster_creator_admin_permissions": true,
                        "cluster_version": "1.30"
                    }
                }
            })
        );
    }

    #[test]
    fn written_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let document = override_document(&Value::Null);

        let file = OverrideFile::write(dir.path(), &document).unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(path, dir.path().join(OVERRIDE_FILE_NAME));

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&content).unwrap(), document);
        assert!(content.contains("\n  \"module\""));

        #[cfg(target_family = "unix")]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        drop(file);
        assert!(!path.exists());
    }

    #[cfg(target_family = "unix")]
    #[test]
    fn leftover_file_is_replaced_with_private_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let leftover = dir.path().join(OVERRIDE_FILE_NAME);
        fs::write(&leftover, "{\"stale\": true}").unwrap();
        fs::set_permissions(&leftover, fs::Permissions::from_mode(0o644)).unwrap();

        let document = override_document(&Value::Null);
        let file = OverrideFile::write(dir.path(), &document).unwrap();

        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let content = fs::read_to_string(file.path()).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&content).unwrap(), document);
    }

    #[test]
    fn already_removed_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let file = OverrideFile::write(dir.path(), &override_document(&Value::Null)).unwrap();
        fs::remove_file(file.path()).unwrap();
        drop(file);
    }

    #[test]
    fn unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = OverrideFile::write(&missing, &Value::Null).unwrap_err();
        assert!(matches!(err, ProvisionerError::WriteOverride { .. }));
    }
}
