use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::EnsureError;

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "tooldeck.toml";

/// Represents the contents of a `tooldeck.toml` file.
///
/// Every field is optional; missing values take the defaults below.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Manifests to resolve, relative to the project root when one is known.
    pub manifests: Vec<PathBuf>,
    pub client: ClientConfig,
    pub install: InstallConfig,
}

/// How to reach the external package client.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Binary name or path. Defaults to `cipd`.
    pub binary: String,
}

/// Where and how packages get installed.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InstallConfig {
    /// Install root. Falls back to `<prefix>_INSTALL_ROOT`, then `.tooldeck`.
    pub root: Option<PathBuf>,
    /// Download cache handed to the client.
    pub cache_dir: Option<PathBuf>,
    /// Install x86 binaries on Apple Silicon.
    pub rosetta: bool,
    /// Skip installing when the recorded digest still matches.
    pub trust_hash: bool,
    /// Prefix of every variable this tool reads or writes.
    pub env_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig { binary: "cipd".to_string() }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        InstallConfig {
            root: None,
            cache_dir: None,
            rosetta: false,
            trust_hash: false,
            env_prefix: "TOOLDECK".to_string(),
        }
    }
}

impl Config {
    /// Loads a `Config` from a file path.
    ///
    /// # Errors
    /// Returns an error if the file can't be read or deserialized.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, EnsureError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| EnsureError::io(path, e))?;
        toml::from_str(&content).map_err(|source| EnsureError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Saves the `Config` to the given file path in pretty TOML format.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), EnsureError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|source| EnsureError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(|e| EnsureError::io(path, e))
    }

    /// Finds the config to use: `explicit` if given, else `./tooldeck.toml`,
    /// else the per-user config file, else defaults.
    pub fn locate(explicit: Option<&Path>) -> Result<Config, EnsureError> {
        if let Some(path) = explicit {
            return Config::load(path);
        }
        let candidates = [Some(PathBuf::from(CONFIG_FILE_NAME)), global_config_path()];
        for candidate in candidates.into_iter().flatten() {
            if candidate.is_file() {
                debug!("using config {}", candidate.display());
                return Config::load(candidate);
            }
        }
        Ok(Config::default())
    }
}

/// Returns `<user config dir>/tooldeck/config.toml`, if the platform has one.
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "tooldeck", "tooldeck").map(|dirs| dirs.config_dir().join("config.toml"))
}
