use std::fmt;
use crate::error::EnsureError;

/// Operating system component of a platform identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Mac,
    Linux,
    Windows,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Mac => "mac",
            Os::Linux => "linux",
            Os::Windows => "windows",
        }
    }
}

/// The `<os>-<arch>` identifier the package client uses to pick binaries,
/// e.g. `linux-amd64` or `mac-arm64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: String,
}

impl Platform {
    /// Detects the platform of the running host.
    ///
    /// With `rosetta` set, `mac-arm64` is reported as `mac-amd64` so that
    /// x86 binaries are installed and run under emulation.
    pub fn detect(rosetta: bool) -> Result<Platform, EnsureError> {
        Platform::from_raw(std::env::consts::OS, std::env::consts::ARCH, rosetta)
    }

    /// Builds a platform from raw OS and machine strings as reported by the
    /// host (`macos`/`darwin`, `aarch64`, `x86_64`, `i686`, ...).
    pub fn from_raw(os: &str, machine: &str, rosetta: bool) -> Result<Platform, EnsureError> {
        let os = match os.to_lowercase().as_str() {
            "darwin" | "macos" => Os::Mac,
            "linux" => Os::Linux,
            "windows" => Os::Windows,
            other => return Err(EnsureError::UnsupportedPlatform(other.to_string())),
        };
        let arch = normalize_arch(machine);
        if os == Os::Mac && arch == "arm64" && rosetta {
            return Ok(Platform { os, arch: "amd64".to_string() });
        }
        Ok(Platform { os, arch })
    }

    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch)
    }
}

fn normalize_arch(machine: &str) -> String {
    if machine.starts_with("aarch64") || machine.starts_with("armv8") {
        "arm64".to_string()
    } else if machine == "x86_64" {
        "amd64".to_string()
    } else if machine == "i686" || machine == "x86" {
        "i386".to_string()
    } else {
        machine.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_x86_64() {
        let platform = Platform::from_raw("Linux", "x86_64", false).unwrap();
        assert_eq!(platform.to_string(), "linux-amd64");
    }

    #[test]
    fn test_arm_variants_normalize_to_arm64() {
        for machine in ["aarch64", "aarch64_be", "armv8l"] {
            let platform = Platform::from_raw("linux", machine, false).unwrap();
            assert_eq!(platform.arch, "arm64");
        }
    }

    #[test]
    fn test_x86_is_i386() {
        assert_eq!(Platform::from_raw("windows", "i686", false).unwrap().to_string(), "windows-i386");
        assert_eq!(Platform::from_raw("windows", "x86", false).unwrap().to_string(), "windows-i386");
    }

    #[test]
    fn test_unknown_machine_is_lowercased() {
        let platform = Platform::from_raw("linux", "RISCV64", false).unwrap();
        assert_eq!(platform.to_string(), "linux-riscv64");
    }

    #[test]
    fn test_rosetta_only_affects_mac_arm64() {
        assert_eq!(Platform::from_raw("darwin", "arm64", true).unwrap().to_string(), "mac-amd64");
        assert_eq!(Platform::from_raw("macos", "aarch64", false).unwrap().to_string(), "mac-arm64");
        assert_eq!(Platform::from_raw("linux", "aarch64", true).unwrap().to_string(), "linux-arm64");
    }

    #[test]
    fn test_unsupported_os() {
        assert!(matches!(
            Platform::from_raw("freebsd", "x86_64", false),
            Err(EnsureError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn test_detect_matches_host() {
        let platform = Platform::detect(false).unwrap();
        #[cfg(target_os = "linux")]
        assert_eq!(platform.os, Os::Linux);
        #[cfg(target_os = "windows")]
        assert!(platform.is_windows());
        #[cfg(target_os = "macos")]
        assert_eq!(platform.os, Os::Mac);
    }
}
