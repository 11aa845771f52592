use crate::command::ProcessRunner;
use crate::config::{
    error::ConfigError,
    loader::{RunnerConfigLoader, RunnerConfigLoaderFile},
    RunnerConfig,
};
use crate::k8s::client::SyncK8sConnector;
use crate::poll::{Cancellation, ThreadSleeper};
use crate::scenario::{Scenario, ScenarioError, ScenarioRunner};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::Subcommand)]
pub enum ScenarioSelection {
    /// Module example creating the VPC and every dependency. Provisions the cluster, then checks
    /// that the EBS CSI driver binds a volume to a running pod.
    Complete,
    /// Module example reusing a pre-existing VPC and IAM resources. Same checks as `complete`.
    ExistingResources,
    /// Every example, concurrently.
    All,
}

impl ScenarioSelection {
    pub fn scenarios(&self) -> Vec<Scenario> {
        match self {
            Self::Complete => vec![Scenario::COMPLETE],
            Self::ExistingResources => vec![Scenario::EXISTING_RESOURCES],
            Self::All => Scenario::all().to_vec(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "eks-module-e2e",
    version,
    about = "E2E test runner for the EKS cluster module examples",
    long_about = "This tool provisions each module example in a real AWS account, checks the \
resulting cluster and destroys everything it created.\n
PREREQUISITES:
- tofu (or terraform) in PATH
- aws cli in PATH, with credentials allowed to create EKS clusters
- bash"
)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Runner config file (yaml). Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// IaC binary, overrides the config file.
    #[arg(long)]
    pub binary: Option<String>,

    /// Directory holding the module examples, overrides the config file.
    #[arg(long)]
    pub examples_dir: Option<PathBuf>,

    /// Directory holding the storage check manifests, overrides the config file.
    #[arg(long)]
    pub fixtures_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub scenario: ScenarioSelection,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Setup(#[from] ScenarioError),

    #[error("installing signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("building async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed scenarios: {}", .0.join(", "))]
    Failed(Vec<String>),
}

impl Cli {
    /// Config file values (or defaults) with the command line overrides on top.
    pub fn runner_config(&self) -> Result<RunnerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RunnerConfigLoaderFile::new(path).load()?,
            None => RunnerConfig::default(),
        };
        if let Some(binary) = &self.binary {
            config.binary = binary.clone();
        }
        if let Some(examples_dir) = &self.examples_dir {
            config.examples_dir = examples_dir.clone();
        }
        if let Some(fixtures_dir) = &self.fixtures_dir {
            config.fixtures_dir = fixtures_dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Runs the selected scenarios. Fails when any of them fails.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let config = cli.runner_config()?;

    let cancellation = Cancellation::default();
    let on_signal = cancellation.clone();
    ctrlc::set_handler(move || {
        warn!("interrupted, cancelling pending cluster checks");
        on_signal.cancel();
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let runner = ScenarioRunner::try_new(
        config,
        ProcessRunner,
        ThreadSleeper,
        SyncK8sConnector::new(Arc::new(runtime)),
        cancellation,
    )?;

    let failed: Vec<String> = runner
        .run_all(&cli.scenario.scenarios())
        .into_iter()
        .filter(|outcome| outcome.result.is_err())
        .map(|outcome| outcome.scenario.name.to_string())
        .collect();

    if failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::Failed(failed))
    }
}
