//! Drives the IaC CLI (`tofu`/`terraform`) through the apply/destroy lifecycle of a module example.
pub mod error;
pub mod override_file;

pub use error::ProvisionerError;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::config::{error::ConfigError, RunnerConfig};
use crate::defaults::{ALREADY_DESTROYED_ERRORS, PROJECT_NAME_VAR, UNIQUE_ID_LEN};
use crate::poll::{Sleeper, ThreadSleeper};
use override_file::{override_document, OverrideFile};
use regex::RegexSet;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use ulid::Ulid;

/// Input variables of an example. Values must be scalars.
pub type Variables = BTreeMap<String, Value>;

/// Short lowercase identifier, safe for cloud resource and Kubernetes names.
pub fn unique_id() -> String {
    let mut id = Ulid::new().to_string().to_lowercase();
    id.split_off(id.len() - UNIQUE_ID_LEN)
}

/// Everything needed to apply and destroy one example. Owns the override file, which is removed
/// when the configuration is dropped.
#[derive(Debug)]
pub struct TestConfiguration {
    dir: PathBuf,
    variables: Variables,
    unique_id: String,
    override_file: OverrideFile,
}

impl TestConfiguration {
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn override_path(&self) -> &Path {
        self.override_file.path()
    }

    fn var_args(&self) -> Vec<String> {
        self.variables
            .iter()
            .flat_map(|(key, value)| ["-var".to_string(), format!("{key}={}", render(value))])
            .collect()
    }
}

/// Live result of an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedStack {
    outputs: BTreeMap<String, String>,
}

impl ProvisionedStack {
    pub fn new(outputs: BTreeMap<String, String>) -> Self {
        Self { outputs }
    }

    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }

    pub fn output(&self, key: &str) -> Result<&str, ProvisionerError> {
        self.outputs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ProvisionerError::MissingOutput(key.to_string()))
    }
}

#[derive(Deserialize)]
struct OutputEntry {
    value: Value,
}

pub struct Provisioner<R, S = ThreadSleeper> {
    runner: R,
    sleeper: S,
    binary: String,
    max_retries: usize,
    time_between_retries: Duration,
    retryable: RegexSet,
    already_destroyed: RegexSet,
    extra_overrides: Value,
}

impl<R: CommandRunner, S: Sleeper> Provisioner<R, S> {
    pub fn try_new(runner: R, sleeper: S, config: &RunnerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            runner,
            sleeper,
            binary: config.binary.clone(),
            max_retries: config.retry.max_retries,
            time_between_retries: config.retry.time_between_retries,
            retryable: config.retry.retryable_set()?,
            already_destroyed: RegexSet::new(ALREADY_DESTROYED_ERRORS)?,
            extra_overrides: config.overrides.clone(),
        })
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Validates the example directory and variables, sets `project_name` to `project_prefix`
    /// followed by a fresh unique id, and writes the override file.
    pub fn prepare(
        &self,
        example_dir: &Path,
        mut variables: Variables,
        project_prefix: &str,
    ) -> Result<TestConfiguration, ProvisionerError> {
        if !example_dir.is_dir() {
            return Err(ProvisionerError::Configuration(format!(
                "example directory `{}` does not exist",
                example_dir.display()
            )));
        }
        if let Some((key, _)) = variables
            .iter()
            .find(|(_, value)| !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        {
            return Err(ProvisionerError::Configuration(format!(
                "variable `{key}` must be a string, number or boolean"
            )));
        }

        let unique_id = unique_id();
        variables.insert(
            PROJECT_NAME_VAR.to_string(),
            Value::String(format!("{project_prefix}{unique_id}")),
        );

        let override_file =
            OverrideFile::write(example_dir, &override_document(&self.extra_overrides))?;
        info!(dir = %example_dir.display(), %unique_id, "test configuration prepared");

        Ok(TestConfiguration {
            dir: example_dir.to_path_buf(),
            variables,
            unique_id,
            override_file,
        })
    }

    /// Runs init and apply, then reads every output.
    pub fn apply(&self, config: &TestConfiguration) -> Result<ProvisionedStack, ProvisionerError> {
        info!(dir = %config.dir.display(), "initializing");
        self.run_with_retries(
            self.command(config)
                .args(["init", "-upgrade=false", "-input=false", "-no-color"]),
        )?;

        info!(dir = %config.dir.display(), "applying");
        self.run_with_retries(
            self.command(config)
                .args(["apply", "-input=false", "-auto-approve", "-lock=false", "-no-color"])
                .args(config.var_args()),
        )?;

        let output = self.run_with_retries(
            self.command(config)
                .args(["output", "-no-color", "-json"]),
        )?;
        let outputs = parse_outputs(&config.dir, &output.stdout)?;
        debug!(outputs = ?outputs.keys().collect::<Vec<_>>(), "stack outputs");

        Ok(ProvisionedStack::new(outputs))
    }

    /// Destroys whatever the configuration created. Destroying a stack that was never applied, or
    /// that is already gone, succeeds.
    pub fn destroy(&self, config: &TestConfiguration) -> Result<(), ProvisionerError> {
        info!(dir = %config.dir.display(), "destroying");
        let spec = self
            .command(config)
            .args(["destroy", "-input=false", "-auto-approve", "-lock=false", "-no-color"])
            .args(config.var_args());

        match self.run_with_retries(spec) {
            Ok(_) => {
                info!(dir = %config.dir.display(), "destroyed");
                Ok(())
            }
            Err(ProvisionerError::Provision { output, .. })
                if self.already_destroyed.is_match(&output) =>
            {
                info!(dir = %config.dir.display(), "nothing to destroy");
                Ok(())
            }
            Err(ProvisionerError::Provision { output, .. }) => Err(ProvisionerError::Destroy {
                dir: config.dir.clone(),
                output,
            }),
            Err(err) => Err(err),
        }
    }

    fn command(&self, config: &TestConfiguration) -> CommandSpec {
        CommandSpec::new(&self.binary)
            .current_dir(&config.dir)
            .env("TF_IN_AUTOMATION", "true")
    }

    fn run_with_retries(&self, spec: CommandSpec) -> Result<CommandOutput, ProvisionerError> {
        let max_attempts = self.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let output = self.runner.run(&spec)?;
            if output.success {
                return Ok(output);
            }

            let combined = output.combined();
            if attempt < max_attempts && self.retryable.is_match(&combined) {
                warn!(
                    command = %spec,
                    "[{attempt}/{max_attempts}] transient error, retrying in {:?}",
                    self.time_between_retries
                );
                self.sleeper.sleep(self.time_between_retries);
                continue;
            }

            return Err(ProvisionerError::Provision {
                command: spec.to_string(),
                attempts: attempt,
                output: combined,
            });
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_outputs(dir: &Path, stdout: &str) -> Result<BTreeMap<String, String>, ProvisionerError> {
    let entries: BTreeMap<String, OutputEntry> =
        serde_json::from_str(stdout).map_err(|err| ProvisionerError::InvalidOutputs {
            dir: dir.to_path_buf(),
            reason: err.to_string(),
        })?;
    Ok(entries
        .into_iter()
        .map(|(key, entry)| (key, render(&entry.value)))
        .collect())
}
