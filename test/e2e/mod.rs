//! Runs the module examples against a real AWS account. Every case creates billable
//! infrastructure and takes around twenty minutes, hence `#[ignore]`.
//!
//! `cargo test --features e2e --test e2e -- --ignored`
use eks_module_e2e::access::ClusterAccessContext;
use eks_module_e2e::command::ProcessRunner;
use eks_module_e2e::config::RunnerConfig;
use eks_module_e2e::defaults::{DEFAULT_NAMESPACE, TEST_NAMESPACE_PREFIX};
use eks_module_e2e::k8s::{client::SyncK8sConnector, ClusterConnector};
use eks_module_e2e::poll::{Cancellation, Poller, ThreadSleeper};
use eks_module_e2e::scenario::{Scenario, ScenarioRunner};
use eks_module_e2e::verifier::{fixtures::StorageFixtures, StorageCheck};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn runtime() -> Arc<tokio::runtime::Runtime> {
    Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap(),
    )
}

fn config() -> RunnerConfig {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    RunnerConfig {
        examples_dir: env::var("E2E_EXAMPLES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| root.join("../examples")),
        fixtures_dir: root.join("fixtures/ebs-csi"),
        ..Default::default()
    }
}

fn run_scenario(scenario: Scenario) {
    let runner = ScenarioRunner::try_new(
        config(),
        ProcessRunner,
        ThreadSleeper,
        SyncK8sConnector::new(runtime()),
        Cancellation::default(),
    )
    .unwrap();

    runner.run(&scenario).unwrap();
}

#[test]
#[ignore = "provisions real AWS infrastructure"]
fn example_complete() {
    run_scenario(Scenario::COMPLETE);
}

#[test]
#[ignore = "provisions real AWS infrastructure"]
fn example_existing_resources() {
    run_scenario(Scenario::EXISTING_RESOURCES);
}

/// Storage check alone, against an already running cluster pointed at by `E2E_KUBECONFIG`.
#[test]
#[ignore = "needs an EKS cluster with the EBS CSI driver"]
fn storage_check_on_existing_cluster() {
    let kubeconfig = PathBuf::from(env::var("E2E_KUBECONFIG").unwrap());
    let access = ClusterAccessContext::new(None, kubeconfig, DEFAULT_NAMESPACE);
    let fixtures = StorageFixtures::load(&config().fixtures_dir).unwrap();
    let poller = Poller::new(config().poll, ThreadSleeper, Cancellation::default());
    let connector = SyncK8sConnector::new(runtime());

    let namespace = format!(
        "{TEST_NAMESPACE_PREFIX}-{}",
        eks_module_e2e::provisioner::unique_id()
    );
    StorageCheck::new(&fixtures, &poller, namespace)
        .run(&access, |context| connector.connect(context))
        .unwrap();
}
