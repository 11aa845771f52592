use std::time::Duration;

/// IaC binary used when none is configured.
pub const DEFAULT_BINARY: &str = "tofu";

pub const DEFAULT_EXAMPLES_DIR: &str = "../examples";
pub const DEFAULT_FIXTURES_DIR: &str = "fixtures/ebs-csi";

/// Terraform override file dropped into the example directory while a case runs.
pub const OVERRIDE_FILE_NAME: &str = "test_override.tf.json";

/// Output holding the shell command that writes the cluster kubeconfig.
pub const KUBECONFIG_COMMAND_OUTPUT: &str = "kubeconfig_command";
pub const KUBECONFIG_FILE_NAME: &str = "kubeconfig";
pub const DEFAULT_NAMESPACE: &str = "default";

pub const PROJECT_NAME_VAR: &str = "project_name";
pub const UNIQUE_ID_LEN: usize = 6;

pub const WAIT_RETRIES: usize = 30;
pub const WAIT_INTERVAL: Duration = Duration::from_secs(10);

pub const MAX_APPLY_RETRIES: usize = 3;
pub const TIME_BETWEEN_APPLY_RETRIES: Duration = Duration::from_secs(5);

pub const TEST_NAMESPACE_PREFIX: &str = "ebs-csi-test";
pub const STORAGE_CLASS_FIXTURE: &str = "storageclass.yaml";
pub const CLAIM_FIXTURE: &str = "pvc.yaml";
pub const POD_FIXTURE: &str = "pod.yaml";

pub const FIELD_MANAGER: &str = "eks-module-e2e";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Transient provider and registry errors worth another apply.
pub const DEFAULT_RETRYABLE_ERRORS: &[&str] = &[
    ".*read: connection reset by peer.*",
    ".*transport is closing.*",
    ".*unable to verify signature.*",
    ".*unable to verify checksum.*",
    ".*no provider exists with the given name.*",
    ".*registry service is unreachable.*",
    ".*Error installing provider.*",
    ".*Failed to query available provider packages.*",
    ".*timeout while waiting for plugin to start.*",
    ".*timed out waiting for server handshake.*",
    "could not query provider registry for",
    ".*Provider produced inconsistent result after apply.*",
    ".*Throttling: Rate exceeded.*",
    ".*RequestLimitExceeded.*",
    ".*TooManyRequestsException.*",
];

/// Destroy output meaning there is nothing left to tear down.
pub const ALREADY_DESTROYED_ERRORS: &[&str] = &[
    "No state file was found",
    "Backend initialization required",
    "Module not installed",
    "Required plugins are not installed",
    "Please run \"(terraform|tofu) init\"",
];
