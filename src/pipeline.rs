//! Resolve → acquire → execute → relay
//!
//! One pipeline covers every way the action is wired: the acquisition
//! strategy decides whether to download, build or both, and the output mode
//! decides between relaying output markers and plain console passthrough.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, info};

use crate::artifact::{ArtifactDescriptor, package_version};
use crate::config::{OutputMode, RunnerSettings};
use crate::download::{DownloadOutcome, Downloader};
use crate::error::RunnerError;
use crate::executor::{ExecutionResult, Executor, StreamMode, ensure_success};
use crate::host::Host;
use crate::platform::TargetTriple;
use crate::relay::relay_outputs;
use crate::source_build::SourceBuilder;
use crate::toolchain::Toolchain;

pub struct Pipeline<T> {
    settings: RunnerSettings,
    downloader: Downloader,
    builder: SourceBuilder<T>,
}

impl<T: Toolchain> Pipeline<T> {
    pub fn new(settings: RunnerSettings, toolchain: T) -> Result<Self, RunnerError> {
        let downloader = Downloader::new(settings.download.clone())?;
        let builder = SourceBuilder::new(toolchain, settings.install_root.clone());
        Ok(Self {
            settings,
            downloader,
            builder,
        })
    }

    pub fn builder(&self) -> &SourceBuilder<T> {
        &self.builder
    }

    /// Artifact descriptor for `triple`, reading the packaged version once
    pub fn describe(&self, triple: TargetTriple) -> Result<ArtifactDescriptor, RunnerError> {
        let version = package_version(
            &self.settings.install_root,
            self.settings.version_override.as_deref(),
        )
        .map_err(|e| RunnerError::Config(format!("{e:#}")))?;

        Ok(ArtifactDescriptor::new(
            &self.settings.release,
            &version,
            triple,
            &self.settings.install_root,
        ))
    }

    /// Resolve the artifact for the current host
    pub async fn resolve(&self, host: &dyn Host) -> Result<PathBuf, RunnerError> {
        let triple = TargetTriple::detect()?;
        let artifact = self.describe(triple)?;
        self.acquire(&artifact, host).await
    }

    /// Cached copy, else download, else source build (as the strategy allows)
    pub async fn acquire(
        &self,
        artifact: &ArtifactDescriptor,
        host: &dyn Host,
    ) -> Result<PathBuf, RunnerError> {
        if artifact.is_cached() {
            debug!("Using cached binary at {}", artifact.local_path().display());
            host.debug(&format!("Using cached binary at {}", artifact.local_path().display()));
            return Ok(artifact.local_path().to_path_buf());
        }

        let strategy = self.settings.strategy;

        if strategy.allows_download() {
            host.info(&format!(
                "Downloading sm-action {} for {}",
                artifact.version(),
                artifact.triple()
            ));
            match self
                .downloader
                .download(artifact.remote_url(), artifact.local_path())
                .await
            {
                DownloadOutcome::Success(path) => return Ok(path),
                DownloadOutcome::Failure(reason) => {
                    host.warning(&format!(
                        "Failed to download sm-action from {}: {reason}",
                        artifact.remote_url()
                    ));
                    if !strategy.allows_build() {
                        return Err(RunnerError::Download(reason));
                    }
                    host.info("Falling back to building sm-action from source");
                }
            }
        }

        self.builder.build(artifact).await
    }

    /// Resolve for the current host and run with `env`
    pub async fn run(
        &self,
        host: &dyn Host,
        env: BTreeMap<String, String>,
    ) -> Result<ExecutionResult, RunnerError> {
        let path = self.resolve(host).await?;
        self.execute(&path, env, host).await
    }

    /// Execute a resolved artifact and handle its output per the output mode
    pub async fn execute(
        &self,
        path: &std::path::Path,
        env: BTreeMap<String, String>,
        host: &dyn Host,
    ) -> Result<ExecutionResult, RunnerError> {
        let stream_mode = match self.settings.output_mode {
            OutputMode::Relay => StreamMode::Capture,
            OutputMode::Inherit => StreamMode::Inherit,
        };
        let executor = Executor::new(stream_mode, env);

        if self.settings.self_test {
            executor.self_test(path).await?;
        }

        let result = executor.execute(path).await?;

        // Echo raw lines so workflow commands printed by the binary still work
        for line in result.stdout.lines() {
            host.info(line);
        }
        for line in result.stderr.lines() {
            host.debug(line);
        }

        ensure_success(path, &result)?;

        if self.settings.output_mode == OutputMode::Relay {
            let declared = relay_outputs(&result.stdout, host);
            info!("Declared {declared} outputs");
        }

        Ok(result)
    }
}
