//! Rust toolchain management for source builds
//!
//! The runner only needs three things from the toolchain: the list of
//! installed compilation targets, a way to add one, and a release build.
//! The [`Toolchain`] trait keeps that surface small so tests can swap in a
//! fake.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info};
use tokio::process::Command;

use crate::error::RunnerError;
use crate::platform::TargetTriple;

/// Build toolchain collaborator
pub trait Toolchain {
    /// Whether the toolchain binaries can be found at all
    fn is_available(&self) -> bool;

    /// Raw listing of installed compilation targets
    fn installed_targets(&self) -> impl Future<Output = Result<String, RunnerError>> + Send;

    fn add_target(&self, triple: TargetTriple) -> impl Future<Output = Result<(), RunnerError>> + Send;

    /// Release build for `triple`, console output passed through
    fn build_release(
        &self,
        triple: TargetTriple,
        project_dir: &Path,
    ) -> impl Future<Output = Result<(), RunnerError>> + Send;
}

/// `rustup` + `cargo` found on PATH
#[derive(Debug, Clone, Default)]
pub struct Rustup {
    rustup: Option<PathBuf>,
    cargo: Option<PathBuf>,
}

impl Rustup {
    /// Locate `rustup` and `cargo` on PATH
    pub fn locate() -> Self {
        let rustup = which::which("rustup").ok();
        let cargo = which::which("cargo").ok();
        debug!("Toolchain lookup: rustup={rustup:?} cargo={cargo:?}");
        Self { rustup, cargo }
    }

    fn rustup(&self) -> Result<&Path, RunnerError> {
        self.rustup
            .as_deref()
            .ok_or_else(|| RunnerError::Build("rustup not found on PATH".to_string()))
    }

    fn cargo(&self) -> Result<&Path, RunnerError> {
        self.cargo
            .as_deref()
            .ok_or_else(|| RunnerError::Build("cargo not found on PATH".to_string()))
    }

    /// `cargo build` whose output lands under `<project_dir>/target`
    fn build_command(&self, triple: TargetTriple, project_dir: &Path) -> Result<Command, RunnerError> {
        let mut command = Command::new(self.cargo()?);
        command
            .args(["build", "--release", "--target", &triple.to_string()])
            .current_dir(project_dir)
            .env_remove("CARGO_TARGET_DIR")
            .stdin(Stdio::null());
        Ok(command)
    }
}

impl Toolchain for Rustup {
    fn is_available(&self) -> bool {
        self.rustup.is_some() && self.cargo.is_some()
    }

    async fn installed_targets(&self) -> Result<String, RunnerError> {
        let output = Command::new(self.rustup()?)
            .args(["target", "list", "--installed"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RunnerError::Build(format!("Failed to run rustup target list: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RunnerError::Build(format!(
                "rustup target list failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn add_target(&self, triple: TargetTriple) -> Result<(), RunnerError> {
        info!("Installing Rust target {triple}");
        let status = Command::new(self.rustup()?)
            .args(["target", "add", &triple.to_string()])
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| RunnerError::Build(format!("Failed to run rustup target add: {e}")))?;

        if !status.success() {
            return Err(RunnerError::Build(format!(
                "rustup target add {triple} exited with {status}"
            )));
        }
        Ok(())
    }

    async fn build_release(&self, triple: TargetTriple, project_dir: &Path) -> Result<(), RunnerError> {
        info!("Building sm-action from source for {triple}");
        let status = self
            .build_command(triple, project_dir)?
            .status()
            .await
            .map_err(|e| RunnerError::Build(format!("Failed to run cargo build: {e}")))?;

        if !status.success() {
            return Err(RunnerError::Build(format!(
                "cargo build --release --target {triple} exited with {status}"
            )));
        }
        Ok(())
    }
}

/// Substring check over the installed-target listing
pub fn has_target(listing: &str, triple: TargetTriple) -> bool {
    listing.contains(&triple.to_string())
}
