//! Operating system and architecture vocabulary.
//!
//! The fixed vocabularies anchor asset filename parsing and define the
//! verified build matrix. Tokens follow Go's `GOOS`/`GOARCH` spelling because
//! template binaries are published under those names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Linux.
    Linux,
    /// macOS.
    Darwin,
    /// Windows.
    Windows,
}

/// Supported CPU architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit x86.
    Amd64,
    /// 64-bit ARM.
    Arm64,
}

impl Os {
    /// Every known OS token.
    pub const ALL: [Self; 3] = [Self::Linux, Self::Darwin, Self::Windows];

    /// Return the filename token for this OS.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
        }
    }

    /// Executable suffix used on this OS.
    #[must_use]
    pub const fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux | Self::Darwin => "",
        }
    }
}

impl Arch {
    /// Every known architecture token.
    pub const ALL: [Self; 2] = [Self::Amd64, Self::Arm64];

    /// Return the filename token for this architecture.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

impl FromStr for Os {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|os| os.as_str() == s)
            .ok_or_else(|| UnknownPlatform(s.to_owned()))
    }
}

impl FromStr for Arch {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| UnknownPlatform(s.to_owned()))
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An OS or architecture token outside the known vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform token \"{0}\"")]
pub struct UnknownPlatform(pub String);

/// An (OS, architecture) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

/// The ordered verified build matrix.
pub const BUILD_MATRIX: [Platform; 6] = [
    Platform::new(Os::Linux, Arch::Amd64),
    Platform::new(Os::Linux, Arch::Arm64),
    Platform::new(Os::Darwin, Arch::Amd64),
    Platform::new(Os::Darwin, Arch::Arm64),
    Platform::new(Os::Windows, Arch::Amd64),
    Platform::new(Os::Windows, Arch::Arm64),
];

impl Platform {
    /// Pair an OS with an architecture.
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detect the platform this process runs on.
    ///
    /// Returns `None` on hosts outside the supported vocabulary.
    #[must_use]
    pub fn host() -> Option<Self> {
        let os = match std::env::consts::OS {
            "linux" => Os::Linux,
            "macos" => Os::Darwin,
            "windows" => Os::Windows,
            _ => return None,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => Arch::Amd64,
            "aarch64" => Arch::Arm64,
            _ => return None,
        };
        Some(Self::new(os, arch))
    }

    /// The `os-arch` key used in platform maps.
    #[must_use]
    pub fn key(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .split_once('-')
            .ok_or_else(|| UnknownPlatform(s.to_owned()))?;
        Ok(Self::new(os.parse()?, arch.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn matrix_has_six_distinct_targets() {
        let mut seen = std::collections::BTreeSet::new();
        for platform in BUILD_MATRIX {
            assert!(seen.insert(platform), "duplicate {platform}");
        }
        assert_eq!(seen.len(), 6);
    }

    #[rstest]
    #[case("linux-amd64", Os::Linux, Arch::Amd64)]
    #[case("darwin-arm64", Os::Darwin, Arch::Arm64)]
    #[case("windows-amd64", Os::Windows, Arch::Amd64)]
    fn parses_platform_keys(#[case] key: &str, #[case] os: Os, #[case] arch: Arch) {
        let platform: Platform = key.parse().expect("known platform");
        assert_eq!(platform, Platform::new(os, arch));
        assert_eq!(platform.key(), key);
    }

    #[rstest]
    #[case("freebsd-amd64")]
    #[case("linux-x86")]
    #[case("linux")]
    fn rejects_unknown_platforms(#[case] key: &str) {
        assert!(key.parse::<Platform>().is_err());
    }

    #[test]
    fn windows_binaries_carry_exe_suffix() {
        assert_eq!(Os::Windows.exe_suffix(), ".exe");
        assert_eq!(Os::Linux.exe_suffix(), "");
    }
}
