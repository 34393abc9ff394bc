use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::artifact::ReleaseSource;
use crate::config::{AcquisitionStrategy, OutputMode, RunnerSettings};

/// Every option can also come from the environment, which is how CI hosts
/// configure the runner.
#[derive(Parser, Debug)]
#[command(version, about = "Resolve, acquire and run the sm-action binary")]
pub struct Args {
    /// Directory holding the action sources and the artifact cache
    #[arg(long, env = "SM_ACTION_INSTALL_ROOT")]
    pub install_root: Option<PathBuf>,

    /// How to acquire the binary when it is not cached
    #[arg(long, env = "SM_ACTION_STRATEGY", value_enum, default_value = "download-then-build")]
    pub strategy: AcquisitionStrategy,

    /// Relay output markers or just pass the console through
    #[arg(long, env = "SM_ACTION_OUTPUT_MODE", value_enum, default_value = "relay")]
    pub output_mode: OutputMode,

    /// Release version to fetch instead of the packaged one
    #[arg(long, env = "SM_ACTION_VERSION")]
    pub artifact_version: Option<String>,

    /// Base URL of the release host
    #[arg(long, env = "SM_ACTION_RELEASE_HOST", default_value = "https://github.com")]
    pub release_host: String,

    #[arg(long, env = "SM_ACTION_REPO_OWNER", default_value = "bitwarden")]
    pub repo_owner: String,

    #[arg(long, env = "SM_ACTION_REPO_NAME", default_value = "sm-action")]
    pub repo_name: String,

    /// Wall-clock limit for the whole download attempt
    #[arg(long, env = "SM_ACTION_DOWNLOAD_TIMEOUT_SECS", default_value_t = 30)]
    pub download_timeout_secs: u64,

    #[arg(long, env = "SM_ACTION_MAX_REDIRECTS", default_value_t = 10)]
    pub max_redirects: usize,

    /// Run the binary's `--test` check before the real invocation
    #[arg(long, env = "SM_ACTION_SELF_TEST")]
    pub self_test: bool,
}

impl Args {
    /// Install root: explicit, else `GITHUB_ACTION_PATH`, else the working directory
    fn resolve_install_root(&self) -> std::io::Result<PathBuf> {
        if let Some(root) = &self.install_root {
            return Ok(root.clone());
        }
        match std::env::var_os("GITHUB_ACTION_PATH").filter(|v| !v.is_empty()) {
            Some(path) => Ok(PathBuf::from(path)),
            None => std::env::current_dir(),
        }
    }

    pub fn into_settings(self) -> std::io::Result<RunnerSettings> {
        let mut settings = RunnerSettings::new(self.resolve_install_root()?)
            .with_download_timeout(Duration::from_secs(self.download_timeout_secs));
        settings.download.max_redirects = self.max_redirects;
        settings.version_override = self.artifact_version;
        settings.release = ReleaseSource {
            host: self.release_host,
            owner: self.repo_owner,
            repo: self.repo_name,
        };
        settings.strategy = self.strategy;
        settings.output_mode = self.output_mode;
        settings.self_test = self.self_test;
        Ok(settings)
    }
}
