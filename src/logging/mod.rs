use std::fmt::Debug;
use thiserror::Error;
use tracing_subscriber::fmt::format::PrettyFields;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log level `{0}`: {1}")]
    InvalidLevel(String, String),

    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

pub struct Logging;

impl Logging {
    /// Installs the global subscriber. `level` accepts anything an `EnvFilter` does, from a bare
    /// `debug` to per-target directives like `info,kube=warn`.
    pub fn try_init(level: &str) -> Result<(), LoggingError> {
        let filter = EnvFilter::try_new(level)
            .map_err(|err| LoggingError::InvalidLevel(level.to_string(), err.to_string()))?;
        tracing_subscriber::fmt()
            .with_target(false)
            // cases run on threads named after them
            .with_thread_names(true)
            .with_env_filter(filter)
            .fmt_fields(PrettyFields::new())
            .try_init()
            .map_err(|_| {
                LoggingError::TryInitError("unable to set global logging subscriber".to_string())
            })
    }
}
