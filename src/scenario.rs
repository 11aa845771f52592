//! One case per module example: provision, check the storage addon, tear down.
use crate::access::{configure_access, AccessError, ClusterAccessContext};
use crate::cleanup::{CleanupError, CleanupStack};
use crate::command::CommandRunner;
use crate::config::{error::ConfigError, RunnerConfig};
use crate::defaults::TEST_NAMESPACE_PREFIX;
use crate::k8s::{client::SyncK8sConnector, ClusterConnector};
use crate::poll::{Cancellation, Poller, Sleeper, ThreadSleeper};
use crate::provisioner::{Provisioner, ProvisionerError, TestConfiguration, Variables};
use crate::verifier::{fixtures::StorageFixtures, StorageCheck, VerifierError};
use std::any::Any;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, info_span};

const EBS_CSI_CHECK: &str = "ebs_csi_driver";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub name: &'static str,
    /// Directory of the example, relative to the examples dir.
    pub example: &'static str,
    pub project_prefix: &'static str,
}

impl Scenario {
    pub const COMPLETE: Scenario = Scenario {
        name: "complete",
        example: "complete",
        project_prefix: "test-complete-",
    };

    pub const EXISTING_RESOURCES: Scenario = Scenario {
        name: "existing-resources",
        example: "existing-resources",
        project_prefix: "test-existing-",
    };

    pub fn all() -> [Scenario; 2] {
        [Self::COMPLETE, Self::EXISTING_RESOURCES]
    }
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("provisioning: {0}")]
    Provisioner(#[from] ProvisionerError),

    #[error("configuring cluster access: {0}")]
    Access(#[from] AccessError),

    #[error("{EBS_CSI_CHECK}: {0}")]
    Verifier(#[from] VerifierError),

    #[error("creating working directory: {0}")]
    Workdir(#[source] std::io::Error),

    #[error("spawning case thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("case panicked: {0}")]
    Panicked(String),

    #[error("cleaning up after a passing case: {}", join_errors(.0))]
    Cleanup(Vec<CleanupError>),
}

fn join_errors(errors: &[CleanupError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub result: Result<(), ScenarioError>,
    pub elapsed: Duration,
}

pub struct ScenarioRunner<R, S = ThreadSleeper, K = SyncK8sConnector> {
    config: RunnerConfig,
    fixtures: StorageFixtures,
    provisioner: Provisioner<R, S>,
    sleeper: S,
    connector: K,
    cancellation: Cancellation,
}

impl<R, S, K> ScenarioRunner<R, S, K>
where
    R: CommandRunner,
    S: Sleeper + Clone,
    K: ClusterConnector,
{
    /// Fixtures are loaded upfront so a broken manifest fails before anything is provisioned.
    pub fn try_new(
        config: RunnerConfig,
        runner: R,
        sleeper: S,
        connector: K,
        cancellation: Cancellation,
    ) -> Result<Self, ScenarioError> {
        config.validate()?;
        let fixtures = StorageFixtures::load(&config.fixtures_dir)?;
        let provisioner = Provisioner::try_new(runner, sleeper.clone(), &config)?;
        Ok(Self {
            config,
            fixtures,
            provisioner,
            sleeper,
            connector,
            cancellation,
        })
    }

    /// Runs a single case. Everything created is torn down before returning, in reverse creation
    /// order. A failed destroy fails an otherwise passing case; after an earlier failure it is
    /// only logged.
    pub fn run(&self, scenario: &Scenario) -> Result<(), ScenarioError> {
        let span = info_span!("scenario", name = scenario.name);
        let _entered = span.enter();

        let example_dir = self.config.examples_dir.join(scenario.example);
        let test_config =
            self.provisioner
                .prepare(&example_dir, Variables::new(), scenario.project_prefix)?;

        let mut cleanups = CleanupStack::new();
        cleanups.defer(format!("stack {}", example_dir.display()), || {
            self.provisioner.destroy(&test_config)
        });

        let result = self.provision_and_check(scenario, &test_config);
        let cleanup_errors = cleanups.release_all();

        match result {
            Ok(()) if !cleanup_errors.is_empty() => Err(ScenarioError::Cleanup(cleanup_errors)),
            Ok(()) => {
                info!("scenario passed");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn provision_and_check(
        &self,
        scenario: &Scenario,
        test_config: &TestConfiguration,
    ) -> Result<(), ScenarioError> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("{}-", scenario.name);
        builder.prefix(&prefix);
        let workdir = match &self.config.workdir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(ScenarioError::Workdir)?;

        let stack = self.provisioner.apply(test_config)?;
        let access = configure_access(self.provisioner.runner(), &stack, workdir.path())?;

        info!(check = EBS_CSI_CHECK, "running cluster check");
        let namespace = format!("{TEST_NAMESPACE_PREFIX}-{}", test_config.unique_id());
        self.check_storage(&access, namespace)?;
        Ok(())
    }

    /// `case_timeout` starts counting here, provisioning time is not part of it.
    fn check_storage(
        &self,
        access: &ClusterAccessContext,
        namespace: String,
    ) -> Result<(), VerifierError> {
        let cancellation = match self.config.case_timeout {
            Some(timeout) => self.cancellation.with_deadline(timeout),
            None => self.cancellation.clone(),
        };
        let poller = Poller::new(self.config.poll, self.sleeper.clone(), cancellation);
        StorageCheck::new(&self.fixtures, &poller, namespace)
            .run(access, |context| self.connector.connect(context))
    }
}

impl<R, S, K> ScenarioRunner<R, S, K>
where
    R: CommandRunner + Sync,
    S: Sleeper + Clone + Sync,
    K: ClusterConnector + Sync,
{
    /// Runs every case on its own thread and waits for all of them.
    pub fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioOutcome> {
        thread::scope(|scope| {
            let handles: Vec<_> = scenarios
                .iter()
                .map(|scenario| {
                    let handle = thread::Builder::new()
                        .name(scenario.name.to_string())
                        .spawn_scoped(scope, move || {
                            let start = Instant::now();
                            let result = self.run(scenario);
                            (result, start.elapsed())
                        });
                    (*scenario, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(scenario, handle)| {
                    let (result, elapsed) = match handle {
                        Ok(handle) => handle.join().unwrap_or_else(|payload| {
                            (
                                Err(ScenarioError::Panicked(panic_message(payload.as_ref()))),
                                Duration::ZERO,
                            )
                        }),
                        Err(err) => (Err(ScenarioError::Spawn(err)), Duration::ZERO),
                    };
                    match &result {
                        Ok(()) => info!(scenario = scenario.name, ?elapsed, "PASS"),
                        Err(err) => error!(scenario = scenario.name, ?elapsed, "FAIL: {err}"),
                    }
                    ScenarioOutcome {
                        scenario,
                        result,
                        elapsed,
                    }
                })
                .collect()
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
