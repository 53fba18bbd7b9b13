use std::fs;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::debug;
use crate::dedup::deduplicate_packages;
use crate::error::EnsureError;
use crate::manifest::{aggregate_packages, PackageEntry, ResolvedManifest};
use crate::platform::Platform;

/// File name of the lock file under the install root.
pub const LOCK_FILE_NAME: &str = "packages.ensure";
/// Snapshot of every package before deduplication.
pub const ALL_PACKAGES_FILE: &str = "all-packages.json";
/// Snapshot of the packages that survived deduplication.
pub const DEDUPED_PACKAGES_FILE: &str = "deduped-packages.json";
/// Resolved manifest list, read by companion tooling.
pub const MANIFEST_LIST_FILE: &str = "_all_package_files.json";

const LOCK_HEADER: &str = "$VerifiedPlatform linux-amd64\n\
                           $VerifiedPlatform mac-amd64\n\
                           $ParanoidMode CheckPresence\n";

/// The package set for one run: everything requested and what survives dedup.
#[derive(Debug, Clone)]
pub struct LockPlan {
    pub all: Vec<PackageEntry>,
    pub deduped: Vec<PackageEntry>,
}

impl LockPlan {
    pub fn from_manifests(manifests: &[ResolvedManifest]) -> LockPlan {
        let all = aggregate_packages(manifests);
        let deduped = deduplicate_packages(&all);
        LockPlan { all, deduped }
    }

    /// Renders the lock file for `platform`.
    ///
    /// Packages whose `platforms` list excludes `platform` are left out; the
    /// client cannot filter those manifests itself.
    pub fn render(&self, platform: &Platform) -> String {
        let platform = platform.to_string();
        let mut out = String::from(LOCK_HEADER);
        for package in &self.deduped {
            if !package.allows_platform(&platform) {
                debug!("skipping {} on {platform}", package.path);
                continue;
            }
            out.push_str(&format!("@Subdir {}\n", package.subdir()));
            out.push_str(&format!("{} {}\n", package.path, package.tags.join(" ")));
        }
        out
    }

    /// Writes the lock file to `lock_path` and both package snapshots next to it.
    ///
    /// Returns the bytes written to the lock file.
    pub fn save<P: AsRef<Path>>(&self, lock_path: P, platform: &Platform) -> Result<Vec<u8>, EnsureError> {
        let lock_path = lock_path.as_ref();
        let dir = lock_path.parent().unwrap_or(Path::new(""));
        write_json(&dir.join(ALL_PACKAGES_FILE), &self.all, "package list")?;
        write_json(&dir.join(DEDUPED_PACKAGES_FILE), &self.deduped, "deduplicated package list")?;

        let contents = self.render(platform).into_bytes();
        fs::write(lock_path, &contents).map_err(|e| EnsureError::io(lock_path, e))?;
        debug!("wrote {} ({} packages)", lock_path.display(), self.deduped.len());
        Ok(contents)
    }
}

/// Records which manifests were resolved, in order, under the install root.
pub fn save_manifest_list(install_root: &Path, manifests: &[ResolvedManifest]) -> Result<PathBuf, EnsureError> {
    let paths: Vec<String> = manifests
        .iter()
        .map(|m| m.path.to_string_lossy().to_string())
        .collect();
    let path = install_root.join(MANIFEST_LIST_FILE);
    write_json(&path, &paths, "manifest list")?;
    Ok(path)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, what: &'static str) -> Result<(), EnsureError> {
    let mut content = serde_json::to_string_pretty(value)
        .map_err(|source| EnsureError::Snapshot { what, source })?;
    content.push('\n');
    fs::write(path, content).map_err(|e| EnsureError::io(path, e))
}
