//! Release asset download with bounded redirects and cleanup on failure
//!
//! A download either leaves a complete file at the destination or leaves no
//! file at all. The body is written to a hidden `.partial` sibling and only
//! renamed onto the destination once it is complete, so a run killed
//! mid-transfer never leaves something that looks like a cached binary.
//! Failures are reported as [`DownloadOutcome::Failure`] because the caller
//! treats them as a cue to fall back to a source build.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use reqwest::{StatusCode, Url};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::artifact::staging_path;
use crate::error::RunnerError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30); // whole attempt, all hops
const DEFAULT_MAX_REDIRECTS: usize = 10;
const USER_AGENT: &str = "bitwarden/sm-action-runner";

/// Tunables for a download attempt
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Result of a download attempt; never partial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success(PathBuf),
    Failure(String),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success(_))
    }
}

/// HTTP(S) downloader that follows redirects itself
pub struct Downloader {
    client: reqwest::Client,
    settings: DownloadSettings,
}

impl Downloader {
    pub fn new(settings: DownloadSettings) -> Result<Self, RunnerError> {
        // Redirects are handled by hand so each hop can discard partial output
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RunnerError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    /// Download `url` to `dest`
    ///
    /// On any failure (status, network, stream, timeout) the destination is
    /// removed before returning.
    pub async fn download(&self, url: &str, dest: &Path) -> DownloadOutcome {
        debug!("Downloading {url} to {}", dest.display());

        // Dropping the future on timeout cancels the in-flight request and
        // closes the file handle before cleanup runs.
        let result = match timeout(self.settings.timeout, self.fetch(url, dest)).await {
            Ok(result) => result,
            Err(_) => Err(format!(
                "Request timed out after {} seconds for {url}",
                self.settings.timeout.as_secs_f32()
            )),
        };

        match result {
            Ok(bytes) => {
                debug!("Downloaded {bytes} bytes to {}", dest.display());
                DownloadOutcome::Success(dest.to_path_buf())
            }
            Err(reason) => {
                discard(dest).await;
                warn!("Download of {url} failed: {reason}");
                DownloadOutcome::Failure(reason)
            }
        }
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, String> {
        let mut current = Url::parse(url).map_err(|e| format!("Invalid URL {url}: {e}"))?;

        for hop in 0..=self.settings.max_redirects {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| format!("Request to {current} failed: {e}"))?;

            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .ok_or_else(|| format!("Redirect ({status}) from {current} has no Location header"))?
                    .to_str()
                    .map_err(|_| format!("Redirect from {current} has a non UTF-8 Location header"))?
                    .to_string();
                drop(response);
                discard(dest).await;

                let next = current
                    .join(&location)
                    .map_err(|e| format!("Invalid redirect location {location}: {e}"))?;
                debug!("Redirect {} ({status}): {current} -> {next}", hop + 1);
                current = next;
                continue;
            }

            if status != StatusCode::OK {
                return Err(format!(
                    "Request failed with status code {} ({}) for {current}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown"),
                ));
            }

            return write_body(response, dest).await;
        }

        Err(format!(
            "Too many redirects (more than {}) starting at {url}",
            self.settings.max_redirects
        ))
    }
}

/// Stream a 200 response body into the staging sibling of `dest`, then
/// rename it into place
async fn write_body(mut response: reqwest::Response, dest: &Path) -> Result<u64, String> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
    }

    let staging = staging_path(dest);
    let mut file = tokio::fs::File::create(&staging)
        .await
        .map_err(|e| format!("Failed to create {}: {e}", staging.display()))?;
    let mut written: u64 = 0;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| format!("Failed while reading response body: {e}"))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("Failed to write {}: {e}", staging.display()))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| format!("Failed to flush {}: {e}", staging.display()))?;
    drop(file);

    tokio::fs::rename(&staging, dest)
        .await
        .map_err(|e| format!("Failed to move download into {}: {e}", dest.display()))?;

    Ok(written)
}

/// Remove a partial download and its staging file; safe when neither exists
pub(crate) async fn discard(dest: &Path) {
    for path in [staging_path(dest), dest.to_path_buf()] {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed partial download {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial download {}: {e}", path.display()),
        }
    }
}
