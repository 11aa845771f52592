use crate::command::CommandError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("writing override file `{path}`: {source}")]
    WriteOverride {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing override document: `{0}`")]
    SerializeOverride(#[from] serde_json::Error),

    #[error("`{command}` failed after {attempts} attempt(s): {output}")]
    Provision {
        command: String,
        attempts: usize,
        output: String,
    },

    #[error("parsing outputs of `{dir}`: {reason}")]
    InvalidOutputs { dir: PathBuf, reason: String },

    #[error("output `{0}` not found")]
    MissingOutput(String),

    #[error("destroying `{dir}`: {output}")]
    Destroy { dir: PathBuf, output: String },

    #[error(transparent)]
    Command(#[from] CommandError),
}
