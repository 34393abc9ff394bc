//! Artifact location: local cache path and release download URL

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::platform::TargetTriple;

/// Base name of the wrapped executable
pub const BINARY_STEM: &str = "sm-action";

/// Directory (under the install root) holding resolved artifacts
const DIST_DIR: &str = "dist";

/// Where release assets are published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSource {
    /// Base URL of the release host, e.g. `https://github.com`
    pub host: String,
    pub owner: String,
    pub repo: String,
}

impl Default for ReleaseSource {
    fn default() -> Self {
        Self {
            host: "https://github.com".to_string(),
            owner: "bitwarden".to_string(),
            repo: "sm-action".to_string(),
        }
    }
}

/// Immutable description of the artifact for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    version: String,
    triple: TargetTriple,
    binary_name: String,
    local_path: PathBuf,
    remote_url: String,
}

impl ArtifactDescriptor {
    pub fn new(
        source: &ReleaseSource,
        version: &str,
        triple: TargetTriple,
        install_root: &Path,
    ) -> Self {
        let binary_name = binary_name(triple);
        let local_path = install_root
            .join(DIST_DIR)
            .join(triple.to_string())
            .join(&binary_name);
        let remote_url = format!(
            "{}/{}/{}/releases/download/{}/{}-{}{}",
            source.host.trim_end_matches('/'),
            source.owner,
            source.repo,
            release_tag(version),
            BINARY_STEM,
            triple,
            triple.exe_suffix(),
        );

        Self {
            version: version.to_string(),
            triple,
            binary_name,
            local_path,
            remote_url,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn triple(&self) -> TargetTriple {
        self.triple
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// Canonical location shared by cache check, download and build copy
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn is_cached(&self) -> bool {
        self.local_path.is_file()
    }
}

/// File name of the executable for a triple
pub fn binary_name(triple: TargetTriple) -> String {
    format!("{BINARY_STEM}{}", triple.exe_suffix())
}

/// Toolchain output location for a release build of `build_triple`
pub fn build_output_path(install_root: &Path, build_triple: TargetTriple) -> PathBuf {
    install_root
        .join("target")
        .join(build_triple.to_string())
        .join("release")
        .join(binary_name(build_triple))
}

/// Hidden sibling that downloads and build copies are written to before
/// being renamed onto `dest`
pub fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.partial"))
}

/// Release tag for a package version: `1.2.3` and `v1.2.3` both give `v1.2.3-bin`
pub fn release_tag(version: &str) -> String {
    let trimmed = version.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    format!("v{bare}-bin")
}

#[derive(Deserialize)]
struct Manifest {
    package: Option<ManifestPackage>,
}

#[derive(Deserialize)]
struct ManifestPackage {
    version: Option<String>,
}

/// Resolve the artifact version from packaging metadata
///
/// Precedence: explicit override, then `[package].version` from the
/// `Cargo.toml` at the install root, then the runner's own version.
pub fn package_version(install_root: &Path, override_version: Option<&str>) -> Result<String> {
    if let Some(version) = override_version.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(version.to_string());
    }

    let manifest_path = install_root.join("Cargo.toml");
    if !manifest_path.is_file() {
        log::debug!(
            "No manifest at {}, using runner version {}",
            manifest_path.display(),
            env!("CARGO_PKG_VERSION")
        );
        return Ok(env!("CARGO_PKG_VERSION").to_string());
    }

    let content = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;

    manifest
        .package
        .and_then(|p| p.version)
        .ok_or_else(|| anyhow::anyhow!("No [package].version in {}", manifest_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(arch: &str, os: &str) -> TargetTriple {
        TargetTriple::from_host(arch, os).unwrap()
    }

    #[test]
    fn remote_url_follows_release_template() {
        let artifact = ArtifactDescriptor::new(
            &ReleaseSource::default(),
            "1.2.3",
            triple("arm64", "darwin"),
            Path::new("/opt/action"),
        );

        assert_eq!(
            artifact.remote_url(),
            "https://github.com/bitwarden/sm-action/releases/download/v1.2.3-bin/sm-action-aarch64-apple-darwin"
        );
    }

    #[test]
    fn windows_artifacts_carry_exe_suffix() {
        let artifact = ArtifactDescriptor::new(
            &ReleaseSource::default(),
            "v2.0.0",
            triple("x64", "win32"),
            Path::new("root"),
        );

        assert_eq!(artifact.binary_name(), "sm-action.exe");
        assert!(artifact.remote_url().ends_with("/v2.0.0-bin/sm-action-x86_64-pc-windows-msvc.exe"));
        assert_eq!(
            artifact.local_path(),
            Path::new("root").join("dist").join("x86_64-pc-windows-msvc").join("sm-action.exe")
        );
    }

    #[test]
    fn local_path_is_triple_qualified() {
        let artifact = ArtifactDescriptor::new(
            &ReleaseSource::default(),
            "1.0.0",
            triple("x64", "linux"),
            Path::new("/opt/action"),
        );

        assert_eq!(
            artifact.local_path(),
            Path::new("/opt/action/dist/x86_64-unknown-linux-musl/sm-action")
        );
        assert!(!artifact.is_cached());
    }

    #[test]
    fn build_output_lives_under_target_release() {
        let path = build_output_path(Path::new("/src"), triple("x64", "linux").build_variant());
        assert_eq!(
            path,
            Path::new("/src/target/x86_64-unknown-linux-gnu/release/sm-action")
        );
    }

    #[test]
    fn staging_file_is_a_hidden_sibling() {
        let dest = Path::new("/opt/action/dist/x86_64-pc-windows-msvc/sm-action.exe");
        assert_eq!(
            staging_path(dest),
            Path::new("/opt/action/dist/x86_64-pc-windows-msvc/.sm-action.exe.partial")
        );
    }

    #[test]
    fn staged_file_alone_is_not_a_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ArtifactDescriptor::new(
            &ReleaseSource::default(),
            "1.2.3",
            triple("x64", "linux"),
            dir.path(),
        );
        let staging = staging_path(artifact.local_path());
        std::fs::create_dir_all(staging.parent().unwrap()).unwrap();
        std::fs::write(&staging, b"\x7fELF trunc").unwrap();

        assert!(!artifact.is_cached());
    }

    #[test]
    fn release_tag_normalises_prefix() {
        assert_eq!(release_tag("1.2.3"), "v1.2.3-bin");
        assert_eq!(release_tag("v1.2.3"), "v1.2.3-bin");
        assert_eq!(release_tag(" V1.2.3 "), "v1.2.3-bin");
    }

    #[test]
    fn package_version_prefers_override() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(package_version(dir.path(), Some("9.9.9")).unwrap(), "9.9.9");
    }

    #[test]
    fn package_version_reads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"sm-action\"\nversion = \"3.1.4\"\n",
        )
        .unwrap();

        assert_eq!(package_version(dir.path(), None).unwrap(), "3.1.4");
        assert_eq!(package_version(dir.path(), Some("  ")).unwrap(), "3.1.4");
    }

    #[test]
    fn package_version_falls_back_to_runner_version() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(package_version(dir.path(), None).unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn package_version_rejects_manifest_without_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[workspace]\nmembers = []\n").unwrap();
        assert!(package_version(dir.path(), None).is_err());
    }
}
