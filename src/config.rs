//! Action inputs and runner settings

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::ReleaseSource;
use crate::download::DownloadSettings;
use crate::error::RunnerError;
use crate::host::Host;

/// Inputs that must be present before anything runs
const REQUIRED_INPUTS: &[&str] = &["access_token", "secrets"];

/// Inputs forwarded to `sm-action` when set
const OPTIONAL_INPUTS: &[&str] = &[
    "base_url",
    "cloud_region",
    "identity_url",
    "api_url",
    "set_env",
    "run",
];

/// Validated action inputs, rendered as the child's environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionInputs {
    values: BTreeMap<String, String>,
}

impl ActionInputs {
    /// Read inputs from the host; the access token is masked immediately
    pub fn from_host(host: &dyn Host) -> Result<Self, RunnerError> {
        let mut values = BTreeMap::new();

        for &name in REQUIRED_INPUTS {
            let value = host
                .input(name)
                .ok_or_else(|| RunnerError::MissingInput(name.to_string()))?;
            if name == "access_token" {
                host.mask(&value);
            }
            values.insert(name.to_string(), value);
        }

        for &name in OPTIONAL_INPUTS {
            if let Some(value) = host.input(name) {
                values.insert(name.to_string(), value);
            }
        }

        Ok(Self { values })
    }

    /// `INPUT_<NAME>` variables for the wrapped program
    pub fn to_env(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (format!("INPUT_{}", k.to_uppercase()), v.clone()))
            .collect()
    }
}

/// Acquisition order when the artifact is not cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AcquisitionStrategy {
    /// Download the release asset, build from source if that fails
    DownloadThenBuild,
    DownloadOnly,
    BuildOnly,
}

impl AcquisitionStrategy {
    pub fn allows_download(&self) -> bool {
        !matches!(self, AcquisitionStrategy::BuildOnly)
    }

    pub fn allows_build(&self) -> bool {
        !matches!(self, AcquisitionStrategy::DownloadOnly)
    }
}

/// What happens with the artifact's console output
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputMode {
    /// Capture stdout/stderr and relay output markers
    Relay,
    /// Stream directly to the console; only the exit status matters
    Inherit,
}

/// Everything the pipeline needs besides the action inputs
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub install_root: PathBuf,
    pub version_override: Option<String>,
    pub release: ReleaseSource,
    pub download: DownloadSettings,
    pub strategy: AcquisitionStrategy,
    pub output_mode: OutputMode,
    pub self_test: bool,
}

impl RunnerSettings {
    /// Defaults rooted at `install_root`
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            version_override: None,
            release: ReleaseSource::default(),
            download: DownloadSettings::default(),
            strategy: AcquisitionStrategy::DownloadThenBuild,
            output_mode: OutputMode::Relay,
            self_test: false,
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download.timeout = timeout;
        self
    }
}
