//! Platform detection for release artifact selection

use std::fmt;

use once_cell::sync::OnceCell;

use crate::error::RunnerError;

/// CPU architecture of a release artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
}

/// Vendor, OS and ABI part of a target triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsVariant {
    LinuxMusl,   // distributed Linux artifacts are statically linked
    LinuxGnu,    // local builds only
    AppleDarwin,
    WindowsMsvc,
}

/// Canonical `arch-vendor-os[-abi]` identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetTriple {
    pub arch: Arch,
    pub os: OsVariant,
}

/// Global cache for platform detection (initialized once, used everywhere)
static HOST_TRIPLE: OnceCell<TargetTriple> = OnceCell::new();

impl Arch {
    /// Map a host-reported architecture name (Node or Rust vocabulary)
    pub fn from_host(arch: &str) -> Result<Self, RunnerError> {
        match arch {
            "x64" | "x86_64" | "amd64" => Ok(Arch::X86_64),
            "arm64" | "aarch64" => Ok(Arch::Aarch64),
            other => Err(RunnerError::UnsupportedArchitecture(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }
}

impl OsVariant {
    /// Map a host-reported OS name (Node or Rust vocabulary)
    pub fn from_host(os: &str) -> Result<Self, RunnerError> {
        match os {
            "linux" => Ok(OsVariant::LinuxMusl),
            "darwin" | "macos" => Ok(OsVariant::AppleDarwin),
            "win32" | "windows" => Ok(OsVariant::WindowsMsvc),
            other => Err(RunnerError::UnsupportedPlatform(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsVariant::LinuxMusl => "unknown-linux-musl",
            OsVariant::LinuxGnu => "unknown-linux-gnu",
            OsVariant::AppleDarwin => "apple-darwin",
            OsVariant::WindowsMsvc => "pc-windows-msvc",
        }
    }
}

impl TargetTriple {
    /// Derive the triple from raw architecture and OS strings
    ///
    /// The architecture is checked first, so an unknown pair reports the
    /// architecture.
    pub fn from_host(arch: &str, os: &str) -> Result<Self, RunnerError> {
        let arch = Arch::from_host(arch)?;
        let os = OsVariant::from_host(os)?;
        Ok(Self { arch, os })
    }

    /// Detect the current host triple (cached after first call)
    pub fn detect() -> Result<Self, RunnerError> {
        HOST_TRIPLE
            .get_or_try_init(|| Self::from_host(std::env::consts::ARCH, std::env::consts::OS))
            .copied()
    }

    /// Triple used for a local source build
    ///
    /// Linux targets are rewritten to the GNU ABI of the same architecture.
    pub fn build_variant(&self) -> Self {
        match self.os {
            OsVariant::LinuxMusl | OsVariant::LinuxGnu => Self {
                arch: self.arch,
                os: OsVariant::LinuxGnu,
            },
            _ => *self,
        }
    }

    pub fn is_linux(&self) -> bool {
        matches!(self.os, OsVariant::LinuxMusl | OsVariant::LinuxGnu)
    }

    pub fn is_windows(&self) -> bool {
        self.os == OsVariant::WindowsMsvc
    }

    /// Executable suffix for binaries targeting this triple
    pub fn exe_suffix(&self) -> &'static str {
        if self.is_windows() { ".exe" } else { "" }
    }
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch.as_str(), self.os.as_str())
    }
}
