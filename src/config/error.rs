use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config yaml: `{0}`")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid retryable error pattern: `{0}`")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
