use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::debug;
use crate::manifest::{manifest_name, ResolvedManifest};
use crate::platform::Platform;

/// Environment mutations requested from the caller's shell.
///
/// The pipeline only issues operations through this trait; applying them is
/// up to whoever owns the sink.
pub trait EnvironmentState {
    fn set(&mut self, key: &str, value: &str);
    fn prepend(&mut self, key: &str, value: &str);
    /// Value previously set in this sink, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// A single recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum EnvAction {
    Set { key: String, value: String },
    Prepend { key: String, value: String },
}

/// Records mutations in order so they can be replayed by a shell.
#[derive(Debug, Clone, Default)]
pub struct EnvChanges {
    actions: Vec<EnvAction>,
    values: HashMap<String, String>,
}

impl EnvChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value visible to [`EnvironmentState::get`] without recording an action.
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn actions(&self) -> &[EnvAction] {
        &self.actions
    }

    /// Renders the changes as POSIX shell statements.
    pub fn to_posix(&self) -> String {
        let mut out = String::new();
        for action in &self.actions {
            match action {
                EnvAction::Set { key, value } => {
                    out.push_str(&format!("{key}={}\nexport {key}\n", shell_quote(value)));
                }
                EnvAction::Prepend { key, value } => {
                    out.push_str(&format!("{key}={}\"${{{key}:+:${key}}}\"\nexport {key}\n", shell_quote(value)));
                }
            }
        }
        out
    }

    /// Renders the changes as Windows batch statements.
    pub fn to_batch(&self) -> String {
        let mut out = String::new();
        for action in &self.actions {
            match action {
                EnvAction::Set { key, value } => out.push_str(&format!("set \"{key}={value}\"\r\n")),
                EnvAction::Prepend { key, value } => out.push_str(&format!("set \"{key}={value};%{key}%\"\r\n")),
            }
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.actions)
    }
}

impl EnvironmentState for EnvChanges {
    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        self.actions.push(EnvAction::Set { key: key.to_string(), value: value.to_string() });
    }

    fn prepend(&mut self, key: &str, value: &str) {
        self.actions.push(EnvAction::Prepend { key: key.to_string(), value: value.to_string() });
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Two-tier lookup: the caller's environment sink first, then the process
/// environment. Empty values count as unset.
pub fn lookup(env: &dyn EnvironmentState, key: &str) -> Option<String> {
    env.get(key)
        .filter(|value| !value.is_empty())
        .or_else(|| std::env::var(key).ok().filter(|value| !value.is_empty()))
}

/// Name of the per-manifest install directory variable, e.g.
/// `TOOLDECK_HOST_TOOLS_INSTALL_DIR` for `host-tools.json`.
pub fn install_dir_var(prefix: &str, manifest: &str) -> String {
    format!("{prefix}_{}_INSTALL_DIR", manifest.to_uppercase().replace('-', "_"))
}

/// Install directory of one manifest's packages.
///
/// A manifest with no packages and exactly one include has no content of its
/// own, so it points at the included manifest's directory instead.
pub fn manifest_install_dir(install_dir: &Path, resolved: &ResolvedManifest) -> PathBuf {
    let manifest = &resolved.manifest;
    if manifest.packages.is_empty() && manifest.included_files.len() == 1 {
        return install_dir.join(manifest_name(&manifest.included_files[0]));
    }
    install_dir.join(resolved.name())
}

/// Exposes installed packages: PATH entries and one directory variable per
/// manifest.
///
/// Manifests are walked in reverse resolution order, so entries of the first
/// resolved manifest are prepended last and end up at the front of PATH.
pub fn materialize(
    env: &mut dyn EnvironmentState,
    manifests: &[ResolvedManifest],
    install_dir: &Path,
    platform: &Platform,
    prefix: &str,
) {
    for resolved in manifests.iter().rev() {
        let name = resolved.name();
        let own_dir = install_dir.join(&name);

        // MinGW packages sometimes nest their toolchain below `mingw64`.
        let mingw = own_dir.join("mingw64").join("bin");
        if platform.is_windows() && mingw.is_dir() {
            env.prepend("PATH", &mingw.to_string_lossy());
        }

        let dir = manifest_install_dir(install_dir, resolved);
        for bin_dir in [dir.clone(), dir.join("bin"), dir.join(platform.to_string()).join("bin")] {
            if bin_dir.is_dir() {
                debug!("adding {} to PATH", bin_dir.display());
                env.prepend("PATH", &bin_dir.to_string_lossy());
            }
        }
        env.set(&install_dir_var(prefix, &name), &dir.to_string_lossy());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Manifest, PackageEntry};
    use tempfile::tempdir;

    fn resolved(name: &str, packages: usize, includes: &[&str]) -> ResolvedManifest {
        ResolvedManifest {
            path: PathBuf::from(format!("tools/{name}.json")),
            manifest: Manifest {
                packages: (0..packages).map(|i| PackageEntry::new(&format!("pkg/{i}"), &[])).collect(),
                included_files: includes.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    fn linux() -> Platform {
        Platform::from_raw("linux", "x86_64", false).unwrap()
    }

    fn prepended(env: &EnvChanges) -> Vec<String> {
        env.actions()
            .iter()
            .filter_map(|action| match action {
                EnvAction::Prepend { key, value } if key == "PATH" => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_install_dir_var() {
        assert_eq!(install_dir_var("TOOLDECK", "host-tools"), "TOOLDECK_HOST_TOOLS_INSTALL_DIR");
    }

    #[test]
    fn test_lookup_prefers_sink() {
        let env = EnvChanges::new().with_var("PATH", "from-sink");
        assert_eq!(lookup(&env, "PATH").as_deref(), Some("from-sink"));
    }

    #[test]
    fn test_lookup_falls_back_to_process_env() {
        let env = EnvChanges::new().with_var("PATH", "");
        assert_eq!(lookup(&env, "PATH"), std::env::var("PATH").ok().filter(|v| !v.is_empty()));
        assert_eq!(lookup(&env, "TOOLDECK_SURELY_UNSET_VARIABLE"), None);
    }

    #[test]
    fn test_aggregator_manifest_delegates() {
        let dir = Path::new("/install/packages");
        let aggregator = resolved("all", 0, &["sub/clang.json"]);
        assert_eq!(manifest_install_dir(dir, &aggregator), dir.join("clang"));

        let with_packages = resolved("all", 1, &["sub/clang.json"]);
        assert_eq!(manifest_install_dir(dir, &with_packages), dir.join("all"));

        let two_includes = resolved("all", 0, &["a.json", "b.json"]);
        assert_eq!(manifest_install_dir(dir, &two_includes), dir.join("all"));
    }

    #[test]
    fn test_materialize_bin_dirs_and_vars() {
        let root = tempdir().unwrap();
        let install_dir = root.path();
        std::fs::create_dir_all(install_dir.join("base").join("bin")).unwrap();
        std::fs::create_dir_all(install_dir.join("legacy").join("linux-amd64").join("bin")).unwrap();

        let manifests = vec![resolved("base", 1, &[]), resolved("legacy", 1, &[]), resolved("absent", 1, &[])];
        let mut env = EnvChanges::new();
        materialize(&mut env, &manifests, install_dir, &linux(), "TOOLDECK");

        let path = |parts: &[&str]| parts.iter().fold(install_dir.to_path_buf(), |p, s| p.join(s)).to_string_lossy().to_string();
        assert_eq!(
            prepended(&env),
            vec![
                path(&["legacy"]),
                path(&["legacy", "linux-amd64", "bin"]),
                path(&["base"]),
                path(&["base", "bin"]),
            ]
        );
        assert_eq!(env.get("TOOLDECK_BASE_INSTALL_DIR"), Some(path(&["base"])));
        assert_eq!(env.get("TOOLDECK_ABSENT_INSTALL_DIR"), Some(path(&["absent"])));
    }

    #[test]
    fn test_materialize_delegated_var() {
        let root = tempdir().unwrap();
        let manifests = vec![resolved("all", 0, &["clang.json"]), resolved("clang", 2, &[])];
        let mut env = EnvChanges::new();
        materialize(&mut env, &manifests, root.path(), &linux(), "TD");
        let clang = root.path().join("clang").to_string_lossy().to_string();
        assert_eq!(env.get("TD_ALL_INSTALL_DIR"), Some(clang.clone()));
        assert_eq!(env.get("TD_CLANG_INSTALL_DIR"), Some(clang));
    }

    #[test]
    fn test_mingw_only_on_windows() {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("gcc").join("mingw64").join("bin")).unwrap();
        let manifests = vec![resolved("gcc", 1, &[])];

        let mut env = EnvChanges::new();
        materialize(&mut env, &manifests, root.path(), &linux(), "TD");
        assert!(!prepended(&env).iter().any(|p| p.contains("mingw64")));

        let windows = Platform::from_raw("windows", "x86_64", false).unwrap();
        let mut env = EnvChanges::new();
        materialize(&mut env, &manifests, root.path(), &windows, "TD");
        assert!(prepended(&env)[0].ends_with("bin") && prepended(&env)[0].contains("mingw64"));
    }

    #[test]
    fn test_posix_rendering() {
        let mut env = EnvChanges::new();
        env.set("TD_INSTALL_DIR", "/opt/it's");
        env.prepend("PATH", "/opt/bin");
        assert_eq!(
            env.to_posix(),
            "TD_INSTALL_DIR='/opt/it'\\''s'\nexport TD_INSTALL_DIR\n\
             PATH='/opt/bin'\"${PATH:+:$PATH}\"\nexport PATH\n"
        );
    }

    #[test]
    fn test_batch_rendering() {
        let mut env = EnvChanges::new();
        env.set("TD_INSTALL_DIR", r"C:\td\install");
        env.prepend("PATH", r"C:\td\install\bin");
        assert_eq!(
            env.to_batch(),
            "set \"TD_INSTALL_DIR=C:\\td\\install\"\r\n\
             set \"PATH=C:\\td\\install\\bin;%PATH%\"\r\n"
        );
    }

    #[test]
    fn test_json_rendering() {
        let mut env = EnvChanges::new();
        env.prepend("PATH", "/opt/bin");
        let json: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["action"], "prepend");
        assert_eq!(json[0]["key"], "PATH");
    }
}
