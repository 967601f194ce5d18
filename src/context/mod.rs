//! Build contexts and composite identifiers
//!
//! A build context is one (platform, interpreter, architecture) target.
//! Selectors match against its composite identifier:
//! `<interpreter-tag>-<platform-arch-label>`, e.g. `cp38-manylinux_i686`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors building a context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("unknown platform '{0}' (expected linux, windows or macos)")]
    UnknownPlatform(String),

    #[error("unknown architecture '{0}'")]
    UnknownArch(String),

    #[error("architecture {arch} is not built on {platform}")]
    UnsupportedArch { platform: Platform, arch: Arch },

    #[error("invalid interpreter tag '{0}': must be non-empty with no '-' or whitespace")]
    InvalidInterpreter(String),
}

/// Target operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    Macos,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Linux, Platform::Windows, Platform::Macos];

    /// Platform identifier used as the key of platform config tables
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Macos => "macos",
        }
    }

    /// Host platform, if it is one we build for
    pub fn current() -> Option<Self> {
        match std::env::consts::OS {
            "linux" => Some(Platform::Linux),
            "windows" => Some(Platform::Windows),
            "macos" => Some(Platform::Macos),
            _ => None,
        }
    }

    /// Architectures built by default on this platform
    pub fn default_archs(&self) -> &'static [Arch] {
        match self {
            Platform::Linux => &[Arch::X86_64, Arch::I686, Arch::Aarch64],
            Platform::Windows => &[Arch::X86_64, Arch::I686],
            Platform::Macos => &[Arch::X86_64, Arch::Aarch64],
        }
    }

    /// Platform/arch label used in identifiers
    pub fn arch_label(&self, arch: Arch) -> Result<&'static str, ContextError> {
        let label = match (self, arch) {
            (Platform::Linux, Arch::X86_64) => "manylinux_x86_64",
            (Platform::Linux, Arch::I686) => "manylinux_i686",
            (Platform::Linux, Arch::Aarch64) => "manylinux_aarch64",
            (Platform::Linux, Arch::Ppc64le) => "manylinux_ppc64le",
            (Platform::Linux, Arch::S390x) => "manylinux_s390x",
            (Platform::Windows, Arch::X86_64) => "win_amd64",
            (Platform::Windows, Arch::I686) => "win32",
            (Platform::Windows, Arch::Aarch64) => "win_arm64",
            (Platform::Macos, Arch::X86_64) => "macosx_x86_64",
            (Platform::Macos, Arch::Aarch64) => "macosx_arm64",
            (Platform::Macos, Arch::Universal2) => "macosx_universal2",
            (platform, arch) => {
                return Err(ContextError::UnsupportedArch {
                    platform: *platform,
                    arch,
                })
            }
        };
        Ok(label)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Platform::Linux),
            "windows" => Ok(Platform::Windows),
            "macos" => Ok(Platform::Macos),
            other => Err(ContextError::UnknownPlatform(other.to_string())),
        }
    }
}

/// CPU architecture
///
/// Windows names (`AMD64`, `x86`, `ARM64`) and macOS names (`arm64`) parse
/// to the same variants as their Linux equivalents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    I686,
    Aarch64,
    Ppc64le,
    S390x,
    Universal2,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::I686 => "i686",
            Arch::Aarch64 => "aarch64",
            Arch::Ppc64le => "ppc64le",
            Arch::S390x => "s390x",
            Arch::Universal2 => "universal2",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" | "AMD64" | "amd64" => Ok(Arch::X86_64),
            "i686" | "x86" | "i386" => Ok(Arch::I686),
            "aarch64" | "arm64" | "ARM64" => Ok(Arch::Aarch64),
            "ppc64le" => Ok(Arch::Ppc64le),
            "s390x" => Ok(Arch::S390x),
            "universal2" => Ok(Arch::Universal2),
            other => Err(ContextError::UnknownArch(other.to_string())),
        }
    }
}

/// One build target. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BuildContext {
    platform: Platform,
    interpreter: String,
    arch: Arch,
    identifier: String,
}

impl BuildContext {
    pub fn new(
        platform: Platform,
        interpreter: impl Into<String>,
        arch: Arch,
    ) -> Result<Self, ContextError> {
        let interpreter = interpreter.into();
        if interpreter.is_empty()
            || interpreter.contains('-')
            || interpreter.chars().any(char::is_whitespace)
        {
            return Err(ContextError::InvalidInterpreter(interpreter));
        }

        let label = platform.arch_label(arch)?;
        let identifier = format!("{}-{}", interpreter, label);

        Ok(Self {
            platform,
            interpreter,
            arch,
            identifier,
        })
    }

    /// Parse all three parts from strings (CLI input)
    pub fn parse(platform: &str, interpreter: &str, arch: &str) -> Result<Self, ContextError> {
        Self::new(platform.parse()?, interpreter, arch.parse()?)
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Composite identifier, e.g. `cp39-win_amd64`
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}
