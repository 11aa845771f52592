pub mod error;

pub use error::CommandError;

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Description of an external process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// First argument, the verb for IaC and kubectl like tools.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Runs a process to completion. A non-zero exit is reported through [CommandOutput::success],
/// only failing to run the process at all is an error.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %spec, "executing");
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).envs(spec.envs.iter().cloned());
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| CommandError::Spawn {
            command: spec.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;

    pub fn succeeded(stdout: &str) -> CommandOutput {
        CommandOutput {
            success: true,
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn spec_display() {
        let spec = CommandSpec::new("tofu")
            .arg("apply")
            .args(["-input=false", "-auto-approve"]);
        assert_eq!(spec.to_string(), "tofu apply -input=false -auto-approve");
        assert_eq!(spec.subcommand(), Some("apply"));
    }

    #[test]
    fn combined_output() {
        let mut output = succeeded("out");
        assert_eq!(output.combined(), "out");
        output.stderr = "err".to_string();
        assert_eq!(output.combined(), "out\nerr");
        assert_eq!(failed("err").combined(), "err");
    }

    #[cfg(target_family = "unix")]
    #[test]
    fn process_runner_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo \"$GREETING from $(basename $(pwd))\"; echo oops >&2; exit 3"])
            .current_dir(dir.path())
            .env("GREETING", "hello");

        let output = ProcessRunner.run(&spec).unwrap();

        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        let dir_name = dir.path().file_name().unwrap().to_string_lossy();
        assert_eq!(output.stdout, format!("hello from {dir_name}"));
        assert_eq!(output.stderr, "oops");
    }

    #[test]
    fn missing_binary_is_an_error() {
        let spec = CommandSpec::new("surely-not-an-installed-binary-4f1c");
        assert_matches!(ProcessRunner.run(&spec), Err(CommandError::Spawn { .. }));
    }
}
