pub mod error;
pub mod loader;
pub mod merge;

use crate::defaults::{
    DEFAULT_BINARY, DEFAULT_EXAMPLES_DIR, DEFAULT_FIXTURES_DIR, DEFAULT_RETRYABLE_ERRORS,
    MAX_APPLY_RETRIES, TIME_BETWEEN_APPLY_RETRIES,
};
use crate::poll::PollPolicy;
use duration_str::{deserialize_duration, deserialize_option_duration};
use error::ConfigError;
use regex::RegexSet;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for a harness run. Every field has a default, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// IaC binary, `tofu` or `terraform`.
    pub binary: String,
    /// Directory holding one sub-directory per module example.
    pub examples_dir: PathBuf,
    /// Directory holding the storage check manifests.
    pub fixtures_dir: PathBuf,
    /// Parent of the per-case working directories (kubeconfig). System temp dir when unset.
    pub workdir: Option<PathBuf>,
    pub poll: PollPolicy,
    pub retry: RetryPolicy,
    /// Upper bound for the cluster checks of a single case, counted once provisioning is done.
    #[serde(deserialize_with = "deserialize_option_duration")]
    pub case_timeout: Option<Duration>,
    /// Extra override document values. The forced test settings always take precedence.
    pub overrides: serde_json::Value,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            examples_dir: PathBuf::from(DEFAULT_EXAMPLES_DIR),
            fixtures_dir: PathBuf::from(DEFAULT_FIXTURES_DIR),
            workdir: None,
            poll: PollPolicy::default(),
            retry: RetryPolicy::default(),
            case_timeout: None,
            overrides: serde_json::Value::Null,
        }
    }
}

impl RunnerConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary.trim().is_empty() {
            return Err(ConfigError::Invalid("binary cannot be empty".to_string()));
        }
        if self.poll.attempts == 0 {
            return Err(ConfigError::Invalid(
                "poll.attempts must be greater than zero".to_string(),
            ));
        }
        if !(self.overrides.is_null() || self.overrides.is_object()) {
            return Err(ConfigError::Invalid(
                "overrides must be a mapping".to_string(),
            ));
        }
        self.retry.retryable_set()?;
        Ok(())
    }
}

/// Retries of IaC invocations failing with a known transient error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    #[serde(deserialize_with = "deserialize_duration")]
    pub time_between_retries: Duration,
    /// Regular expressions matched against the combined command output.
    pub retryable_errors: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_APPLY_RETRIES,
            time_between_retries: TIME_BETWEEN_APPLY_RETRIES,
            retryable_errors: DEFAULT_RETRYABLE_ERRORS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl RetryPolicy {
    pub fn retryable_set(&self) -> Result<RegexSet, ConfigError> {
        Ok(RegexSet::new(&self.retryable_errors)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn empty_content_is_default() {
        assert_eq!(RunnerConfig::from_yaml("").unwrap(), RunnerConfig::default());
        assert_eq!(
            RunnerConfig::from_yaml("  \n").unwrap(),
            RunnerConfig::default()
        );
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = RunnerConfig::from_yaml(
            r#"
binary: terraform
poll:
  attempts: 3
retry:
  time_between_retries: 1s
case_timeout: 20m
overrides:
  module:
    cluster:
      cluster_version: "1.30"
"#,
        )
        .unwrap();

        assert_eq!(config.binary, "terraform");
        assert_eq!(
            config.poll,
            PollPolicy {
                attempts: 3,
                ..Default::default()
            }
        );
        assert_eq!(config.retry.max_retries, MAX_APPLY_RETRIES);
        assert_eq!(config.retry.time_between_retries, Duration::from_secs(1));
        assert_eq!(
            config.retry.retryable_errors.len(),
            DEFAULT_RETRYABLE_ERRORS.len()
        );
        assert_eq!(config.case_timeout, Some(Duration::from_secs(20 * 60)));
        assert_eq!(
            config.overrides,
            json!({"module": {"cluster": {"cluster_version": "1.30"}}})
        );
        assert_eq!(config.examples_dir, PathBuf::from(DEFAULT_EXAMPLES_DIR));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert_matches!(
            RunnerConfig::from_yaml("binary: tofu\nretries: 3"),
            Err(ConfigError::Yaml(_))
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_matches!(
            RunnerConfig::from_yaml("poll:\n  attempts: 0"),
            Err(ConfigError::Invalid(_))
        );
        assert_matches!(
            RunnerConfig::from_yaml("binary: ''"),
            Err(ConfigError::Invalid(_))
        );
        assert_matches!(
            RunnerConfig::from_yaml("overrides: [1, 2]"),
            Err(ConfigError::Invalid(_))
        );
        assert_matches!(
            RunnerConfig::from_yaml("retry:\n  retryable_errors: ['(unclosed']"),
            Err(ConfigError::InvalidPattern(_))
        );
    }

    #[test]
    fn default_retryable_errors_match_transient_failures() {
        let set = RetryPolicy::default().retryable_set().unwrap();
        assert!(set.is_match("Error: Provider produced inconsistent result after apply"));
        assert!(set.is_match("api error Throttling: Rate exceeded"));
        assert!(set.is_match("Error: Failed to query available provider packages"));
        assert!(!set.is_match("Error: Invalid value for variable"));
    }
}
