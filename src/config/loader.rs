use super::{error::ConfigError, RunnerConfig};
use std::path::{Path, PathBuf};

pub trait RunnerConfigLoader {
    fn load(&self) -> Result<RunnerConfig, ConfigError>;
}

/// Loads the config from a yaml file.
pub struct RunnerConfigLoaderFile {
    file_path: PathBuf,
}

impl RunnerConfigLoaderFile {
    pub fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
        }
    }
}

impl RunnerConfigLoader for RunnerConfigLoaderFile {
    fn load(&self) -> Result<RunnerConfig, ConfigError> {
        let content =
            std::fs::read_to_string(&self.file_path).map_err(|source| ConfigError::Read {
                path: self.file_path.clone(),
                source,
            })?;
        RunnerConfig::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "binary: terraform\nexamples_dir: /opt/module/examples").unwrap();

        let config = RunnerConfigLoaderFile::new(file.path()).load().unwrap();

        assert_eq!(config.binary, "terraform");
        assert_eq!(config.examples_dir, PathBuf::from("/opt/module/examples"));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");

        assert_matches!(
            RunnerConfigLoaderFile::new(&path).load(),
            Err(ConfigError::Read { path: p, .. }) => assert_eq!(p, path)
        );
    }
}
