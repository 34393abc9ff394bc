//! Artifact execution
//!
//! The wrapped program reads its configuration from environment variables.
//! Those are handed to the child explicitly; the runner's own environment is
//! never mutated.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use log::{debug, info};
use tokio::process::Command;

use crate::error::RunnerError;

/// How the child's stdout/stderr are wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Collect both streams for relaying
    Capture,
    /// Pass both streams straight to the runner's console
    Inherit,
}

/// Outcome of one artifact invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub struct Executor {
    mode: StreamMode,
    env: BTreeMap<String, String>,
}

impl Executor {
    pub fn new(mode: StreamMode, env: BTreeMap<String, String>) -> Self {
        Self { mode, env }
    }

    /// Run the artifact; a non-zero exit is an error carrying stderr
    pub async fn run(&self, path: &Path) -> Result<ExecutionResult, RunnerError> {
        let result = self.execute(path).await?;
        ensure_success(path, &result)?;
        Ok(result)
    }

    /// Run the artifact and report whatever it did, exit status unchecked
    pub async fn execute(&self, path: &Path) -> Result<ExecutionResult, RunnerError> {
        self.invoke(path, &[], self.mode).await
    }

    /// Run the artifact's built-in `--test` check and expect `success`
    pub async fn self_test(&self, path: &Path) -> Result<(), RunnerError> {
        let result = self.invoke(path, &["--test"], StreamMode::Capture).await?;
        ensure_success(path, &result)?;
        if result.stdout.trim() != "success" {
            return Err(RunnerError::Execution(format!(
                "{} self-test printed {:?} instead of \"success\"",
                display_name(path),
                result.stdout.trim()
            )));
        }
        info!("Self-test of {} passed", path.display());
        Ok(())
    }

    async fn invoke(
        &self,
        path: &Path,
        args: &[&str],
        mode: StreamMode,
    ) -> Result<ExecutionResult, RunnerError> {
        if !path.is_file() {
            return Err(RunnerError::Execution(format!(
                "Binary not found at {}",
                path.display()
            )));
        }
        make_executable(path)?;

        let mut command = Command::new(path);
        command.args(args).envs(&self.env).stdin(Stdio::null());
        debug!(
            "Executing {} with {} configured variables",
            path.display(),
            self.env.len()
        );

        match mode {
            StreamMode::Capture => {
                let output = command
                    .output()
                    .await
                    .map_err(|e| spawn_error(path, e))?;
                Ok(ExecutionResult {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            StreamMode::Inherit => {
                let status = command
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(|e| spawn_error(path, e))?;
                Ok(ExecutionResult {
                    exit_code: status.code(),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }
    }
}

/// Set mode 0755; downloaded or copied files are not executable by default
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<(), RunnerError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(|e| RunnerError::io("Failed to read metadata", path, e))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
        .map_err(|e| RunnerError::io("Failed to set permissions", path, e))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<(), RunnerError> {
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn spawn_error(path: &Path, e: std::io::Error) -> RunnerError {
    RunnerError::Execution(format!("Failed to execute {}: {e}", path.display()))
}

/// Turn a non-zero exit into [`RunnerError::Execution`]
pub fn ensure_success(path: &Path, result: &ExecutionResult) -> Result<(), RunnerError> {
    if result.success() {
        Ok(())
    } else {
        Err(RunnerError::Execution(failure_message(path, result)))
    }
}

fn failure_message(path: &Path, result: &ExecutionResult) -> String {
    let name = display_name(path);
    let mut message = match result.exit_code {
        Some(code) => format!("{name} exited with code {code}."),
        None => format!("{name} was terminated by a signal."),
    };
    let stderr = result.stderr.trim();
    if !stderr.is_empty() {
        message.push_str(" Error: ");
        message.push_str(stderr);
    }
    message
}
