//! Cluster credentials obtained from a provisioned stack.
use crate::command::{CommandError, CommandRunner, CommandSpec};
use crate::defaults::{DEFAULT_NAMESPACE, KUBECONFIG_COMMAND_OUTPUT, KUBECONFIG_FILE_NAME};
use crate::provisioner::ProvisionedStack;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("stack output `{0}` is missing or empty")]
    MissingOutput(String),

    #[error("kubeconfig command `{command}` failed: {output}")]
    CommandFailed { command: String, output: String },

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Which kubeconfig, context and default namespace API calls use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAccessContext {
    context: Option<String>,
    kubeconfig: PathBuf,
    namespace: String,
}

impl ClusterAccessContext {
    pub fn new(context: Option<String>, kubeconfig: PathBuf, namespace: impl Into<String>) -> Self {
        Self {
            context,
            kubeconfig,
            namespace: namespace.into(),
        }
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Same credentials scoped to another namespace.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..self.clone()
        }
    }
}

/// Runs the stack's `kubeconfig_command` output so it writes a kubeconfig inside `workdir`.
pub fn configure_access<R: CommandRunner>(
    runner: &R,
    stack: &ProvisionedStack,
    workdir: &Path,
) -> Result<ClusterAccessContext, AccessError> {
    let kubeconfig_command = stack
        .output(KUBECONFIG_COMMAND_OUTPUT)
        .ok()
        .map(str::trim)
        .filter(|command| !command.is_empty())
        .ok_or_else(|| AccessError::MissingOutput(KUBECONFIG_COMMAND_OUTPUT.to_string()))?;

    let kubeconfig = workdir.join(KUBECONFIG_FILE_NAME);
    let command = format!("{kubeconfig_command} --kubeconfig {}", kubeconfig.display());
    let output = runner.run(&CommandSpec::new("bash").args(["-c", command.as_str()]))?;
    if !output.success {
        return Err(AccessError::CommandFailed {
            command,
            output: output.combined(),
        });
    }
    info!(kubeconfig = %kubeconfig.display(), "cluster access configured");

    Ok(ClusterAccessContext::new(
        None,
        kubeconfig,
        DEFAULT_NAMESPACE,
    ))
}
