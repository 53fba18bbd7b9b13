use std::collections::HashSet;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use crate::error::EnsureError;

/// Represents the contents of a package manifest (`*.json`).
///
/// A manifest lists packages to install and, optionally, other manifests to
/// pull in. Included paths are relative to the including manifest's directory.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// Packages declared directly by this manifest.
    #[serde(default)]
    pub packages: Vec<PackageEntry>,
    /// Other manifests this one includes.
    #[serde(default)]
    pub included_files: Vec<String>,
}

/// One installable unit from a manifest.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PackageEntry {
    /// Namespaced location in the package store, e.g. `infra/tools/foo/${platform}`.
    pub path: String,
    /// Version or ref selectors, in order (e.g. `version:1.2.3`).
    #[serde(default)]
    pub tags: Vec<String>,
    /// Installation subdirectory. Always set once the package has been namespaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    /// The subdir declared in the manifest before namespacing, if there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_subdir: Option<String>,
    /// Platforms this package may be installed on. Absent means "everywhere".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
    /// Fields the resolver does not interpret, kept for the diagnostic snapshots.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageEntry {
    pub fn new(path: &str, tags: &[&str]) -> PackageEntry {
        PackageEntry {
            path: path.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            subdir: None,
            original_subdir: None,
            platforms: None,
            extra: Map::new(),
        }
    }

    pub fn subdir(&self) -> &str {
        self.subdir.as_deref().unwrap_or_default()
    }

    /// Identity used for deduplication: the package path followed by the
    /// pre-namespacing subdir (empty when there was none).
    pub fn dedup_key(&self) -> String {
        format!("{}{}", self.path, self.original_subdir.as_deref().unwrap_or_default())
    }

    /// Whether this package should be installed on `platform`.
    ///
    /// An absent or empty `platforms` list allows every platform.
    pub fn allows_platform(&self, platform: &str) -> bool {
        match &self.platforms {
            Some(platforms) if !platforms.is_empty() => platforms.iter().any(|p| p == platform),
            _ => true,
        }
    }

    /// Stamps the package with a subdir derived from the owning manifest name.
    ///
    /// A previously declared subdir is kept in `original_subdir` and nested
    /// below the manifest name.
    pub fn namespace(&mut self, manifest_name: &str) {
        match self.subdir.take() {
            Some(subdir) => {
                self.subdir = Some(format!("{manifest_name}/{subdir}"));
                self.original_subdir = Some(subdir);
            }
            None => {
                self.subdir = Some(manifest_name.to_string());
            }
        }
    }
}

impl Manifest {
    /// Loads a manifest from a file path.
    ///
    /// # Errors
    /// Returns [`EnsureError::ManifestRead`] if the file can't be read and
    /// [`EnsureError::ManifestParse`] if it is not a valid manifest.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Manifest, EnsureError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| EnsureError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| EnsureError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A manifest together with the path it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedManifest {
    pub path: PathBuf,
    pub manifest: Manifest,
}

impl ResolvedManifest {
    /// The manifest's file name without extension, e.g. `pigweed` for `pigweed.json`.
    pub fn name(&self) -> String {
        manifest_name(&self.path)
    }

    /// Paths of the manifests this one includes, resolved against its directory.
    pub fn included_paths(&self) -> Vec<PathBuf> {
        let dir = self.path.parent().unwrap_or(Path::new(""));
        self.manifest.included_files.iter().map(|entry| dir.join(entry)).collect()
    }
}

/// Returns the base name of a manifest file, without directory or extension.
pub fn manifest_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Resolves the starting manifests and everything they transitively include.
///
/// The traversal is depth-first: a manifest is emitted, then its includes are
/// visited before its next sibling. Every file is emitted once, at its first
/// encounter, keyed by canonical path. Self-inclusion and cycles are skipped.
///
/// # Errors
/// Any missing or malformed manifest aborts the whole resolution.
pub fn resolve_manifests(starting: &[PathBuf]) -> Result<Vec<ResolvedManifest>, EnsureError> {
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut resolved = Vec::new();
    let mut stack: Vec<PathBuf> = starting.iter().rev().cloned().collect();

    while let Some(path) = stack.pop() {
        let key = std::fs::canonicalize(&path).map_err(|source| EnsureError::ManifestRead {
            path: path.clone(),
            source,
        })?;
        if !visited.insert(key) {
            debug!("skipping already resolved manifest {}", path.display());
            continue;
        }
        let manifest = ResolvedManifest {
            manifest: Manifest::load(&path)?,
            path,
        };
        debug!("resolved manifest {}", manifest.path.display());
        for include in manifest.included_paths().into_iter().rev() {
            stack.push(include);
        }
        resolved.push(manifest);
    }
    Ok(resolved)
}

/// Collects the packages of every resolved manifest, in resolution order, and
/// namespaces each one under its owning manifest's name.
pub fn aggregate_packages(manifests: &[ResolvedManifest]) -> Vec<PackageEntry> {
    let mut packages = Vec::new();
    for resolved in manifests {
        let name = resolved.name();
        for package in &resolved.manifest.packages {
            let mut package = package.clone();
            package.namespace(&name);
            packages.push(package);
        }
    }
    packages
}
