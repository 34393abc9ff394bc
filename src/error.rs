//! Error taxonomy for the runner pipeline
//!
//! Only [`RunnerError::Download`] is recoverable: the pipeline converts it into
//! a build fallback. Every other variant terminates the run.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving, acquiring or executing the artifact
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Input required and not supplied: {0}")]
    MissingInput(String),

    #[error("{0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{context}: {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RunnerError {
    /// Download failures trigger the build fallback instead of ending the run
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RunnerError::Download(_))
    }

    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunnerError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
