//! Source build fallback
//!
//! Used when no prebuilt artifact could be downloaded. Linux builds target the
//! GNU ABI even though released Linux artifacts are musl: the GNU target is
//! what a stock toolchain can produce without extra linkers. The rewrite is
//! one-shot; a failed GNU build is not retried with the original triple.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::artifact::{ArtifactDescriptor, build_output_path, staging_path};
use crate::error::RunnerError;
use crate::platform::TargetTriple;
use crate::toolchain::{Toolchain, has_target};

/// What a source build needs to know before it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildRequest {
    pub build_triple: TargetTriple,
    pub toolchain_available: bool,
}

impl BuildRequest {
    pub fn new(runtime_triple: TargetTriple, toolchain_available: bool) -> Self {
        Self {
            build_triple: runtime_triple.build_variant(),
            toolchain_available,
        }
    }
}

/// Builds the artifact with a [`Toolchain`] and installs it at the canonical path
pub struct SourceBuilder<T> {
    toolchain: T,
    project_dir: PathBuf,
}

impl<T: Toolchain> SourceBuilder<T> {
    pub fn new(toolchain: T, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            project_dir: project_dir.into(),
        }
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Build, then copy the output to `artifact.local_path()`
    ///
    /// Every error is fatal to the run.
    pub async fn build(&self, artifact: &ArtifactDescriptor) -> Result<PathBuf, RunnerError> {
        let request = BuildRequest::new(artifact.triple(), self.toolchain.is_available());
        if !request.toolchain_available {
            return Err(RunnerError::Build(
                "Rust toolchain (rustup and cargo) is not available".to_string(),
            ));
        }

        let installed = self.toolchain.installed_targets().await?;
        if has_target(&installed, request.build_triple) {
            debug!("Target {} already installed", request.build_triple);
        } else {
            self.toolchain.add_target(request.build_triple).await?;
        }

        self.toolchain
            .build_release(request.build_triple, &self.project_dir)
            .await?;

        let output = build_output_path(&self.project_dir, request.build_triple);
        if !output.is_file() {
            return Err(RunnerError::Build(format!(
                "failed to build binary at {}",
                output.display()
            )));
        }

        install_artifact(&output, artifact.local_path()).await?;
        info!(
            "Installed source build {} -> {}",
            output.display(),
            artifact.local_path().display()
        );
        Ok(artifact.local_path().to_path_buf())
    }
}

/// Copy through a sibling temp file so `dest` is either absent or complete
async fn install_artifact(src: &Path, dest: &Path) -> Result<(), RunnerError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RunnerError::io("Failed to create artifact directory", parent, e))?;
    }

    if dest.file_name().is_none() {
        return Err(RunnerError::Build(format!("Invalid artifact path: {}", dest.display())));
    }
    let staging = staging_path(dest);

    let result = async {
        tokio::fs::copy(src, &staging)
            .await
            .map_err(|e| RunnerError::io("Failed to copy build output", &staging, e))?;
        tokio::fs::rename(&staging, dest)
            .await
            .map_err(|e| RunnerError::io("Failed to move build output into place", dest, e))
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&staging).await;
    }
    result
}
