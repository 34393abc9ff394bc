//! Launcher for the platform-specific `sm-action` binary
//!
//! Resolves the host's target triple, reuses a cached binary or downloads the
//! matching release asset, falls back to a source build when the download
//! fails, then runs the binary and relays its declared outputs to the host.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod executor;
pub mod host;
pub mod pipeline;
pub mod platform;
pub mod relay;
pub mod source_build;
pub mod toolchain;

pub use error::RunnerError;

use config::{ActionInputs, RunnerSettings};
use executor::ExecutionResult;
use host::Host;
use pipeline::Pipeline;
use toolchain::Toolchain;

/// Validate inputs, then resolve and run the binary for the current host
///
/// Inputs are checked before any download or build is attempted.
pub async fn run_action<T: Toolchain>(
    settings: RunnerSettings,
    toolchain: T,
    host: &dyn Host,
) -> Result<ExecutionResult, RunnerError> {
    let inputs = ActionInputs::from_host(host)?;
    let pipeline = Pipeline::new(settings, toolchain)?;
    pipeline.run(host, inputs.to_env()).await
}
