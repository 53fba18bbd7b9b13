use std::path::{Path, PathBuf};
use tracing::info;
use crate::auth::{probe_paths, verify_access};
use crate::client::{EnsureArgs, EnsureCommand, PackageClient};
use crate::config::Config;
use crate::env::{lookup, materialize, EnvironmentState};
use crate::error::EnsureError;
use crate::hash::{compute_digest, IntegrityCache};
use crate::installer::{install, INSTALL_LOG_NAME};
use crate::lock::{save_manifest_list, LockPlan, LOCK_FILE_NAME};
use crate::manifest::{resolve_manifests, ResolvedManifest};
use crate::platform::Platform;

/// Variable the client reads its download cache location from.
pub const CACHE_DIR_VAR: &str = "CIPD_CACHE_DIR";

/// Caller-provided inputs. Unset values are filled in by [`UpdateOptions::resolve`].
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub manifests: Vec<PathBuf>,
    pub install_root: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub service_account: Option<PathBuf>,
    pub client_binary: String,
    pub rosetta: bool,
    pub trust_hash: bool,
    pub env_prefix: String,
}

impl UpdateOptions {
    pub fn from_config(config: &Config) -> UpdateOptions {
        UpdateOptions {
            manifests: config.manifests.clone(),
            install_root: config.install.root.clone(),
            cache_dir: config.install.cache_dir.clone(),
            service_account: None,
            client_binary: config.client.binary.clone(),
            rosetta: config.install.rosetta,
            trust_hash: config.install.trust_hash,
            env_prefix: config.install.env_prefix.clone(),
        }
    }

    /// Fills unset locations from the environment.
    ///
    /// Explicit options win, then `env`, then the process environment:
    /// `<prefix>_PROJECT_ROOT` anchors relative manifest paths,
    /// `<prefix>_INSTALL_ROOT` and `CIPD_CACHE_DIR` provide locations and
    /// `<prefix>_SERVICE_ACCOUNT_JSON` a credential file. The install root
    /// defaults to `.tooldeck`; relative roots are anchored at the project
    /// root or the working directory.
    pub fn resolve(&self, env: &dyn EnvironmentState) -> Result<Settings, EnsureError> {
        let var = |name: &str| lookup(env, &format!("{}_{name}", self.env_prefix)).map(PathBuf::from);
        let project_root = var("PROJECT_ROOT");

        let manifests = match &project_root {
            Some(root) => self.manifests.iter().map(|m| root.join(m)).collect(),
            None => self.manifests.clone(),
        };
        let base = match &project_root {
            Some(root) => root.clone(),
            None => std::env::current_dir().map_err(|e| EnsureError::io(".", e))?,
        };
        let install_root = base.join(
            self.install_root
                .clone()
                .or_else(|| var("INSTALL_ROOT"))
                .unwrap_or_else(|| PathBuf::from(".tooldeck")),
        );

        Ok(Settings {
            manifests,
            install_root,
            cache_dir: self.cache_dir.clone().or_else(|| lookup(env, CACHE_DIR_VAR).map(PathBuf::from)),
            service_account: self.service_account.clone().or_else(|| var("SERVICE_ACCOUNT_JSON")),
            client_binary: self.client_binary.clone(),
            platform: Platform::detect(self.rosetta)?,
            trust_hash: self.trust_hash,
            env_prefix: self.env_prefix.clone(),
        })
    }
}

/// Fully resolved inputs of one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub manifests: Vec<PathBuf>,
    pub install_root: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub service_account: Option<PathBuf>,
    pub client_binary: String,
    pub platform: Platform,
    pub trust_hash: bool,
    pub env_prefix: String,
}

impl Settings {
    pub fn lock_file(&self) -> PathBuf {
        self.install_root.join(LOCK_FILE_NAME)
    }

    /// Where the client extracts packages.
    pub fn install_dir(&self) -> PathBuf {
        self.install_root.join("packages")
    }

    pub fn json_output(&self) -> PathBuf {
        self.install_root.join("packages.json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.install_root.join(INSTALL_LOG_NAME)
    }

    pub fn ensure_command(&self) -> EnsureCommand {
        EnsureCommand::new(&self.client_binary, EnsureArgs {
            lock_file: &self.lock_file(),
            install_dir: &self.install_dir(),
            json_output: &self.json_output(),
            cache_dir: self.cache_dir.as_deref(),
            service_account: self.service_account.as_deref(),
        })
    }
}

/// How an update run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The recorded digest matched; nothing was installed. Environment
    /// variables are still exported.
    UpToDate,
    Installed,
}

/// Resolves manifests and writes the lock file plus its snapshots.
///
/// Returns the resolved manifests and the lock file bytes.
pub fn write_lock(settings: &Settings) -> Result<(Vec<ResolvedManifest>, Vec<u8>), EnsureError> {
    let manifests = resolve_manifests(&settings.manifests)?;
    ensure_dir(&settings.install_root)?;
    save_manifest_list(&settings.install_root, &manifests)?;
    let lock = LockPlan::from_manifests(&manifests).save(settings.lock_file(), &settings.platform)?;
    Ok((manifests, lock))
}

/// Runs the whole pipeline: resolve, lock, cache check, access check,
/// install, and environment export.
///
/// # Errors
/// Stops at the first fatal error. Files already written (lock file, logs)
/// are left in place.
pub fn update<C: PackageClient>(
    client: &C,
    settings: &Settings,
    env: &mut dyn EnvironmentState,
) -> Result<UpdateOutcome, EnsureError> {
    let root = &settings.install_root;
    let (manifests, lock) = write_lock(settings)?;

    let root_str = root.to_string_lossy();
    env.prepend("PATH", &root_str);
    env.set(&format!("{}_INSTALL_DIR", settings.env_prefix), &root_str);
    if let Some(cache_dir) = &settings.cache_dir {
        env.set(CACHE_DIR_VAR, &cache_dir.to_string_lossy());
    }

    let command = settings.ensure_command();
    let digest = compute_digest(&command, &lock);
    let cache = IntegrityCache::new(root);

    let outcome = if cache.is_fresh(&digest, settings.trust_hash) {
        info!("packages up to date ({digest})");
        UpdateOutcome::UpToDate
    } else {
        verify_access(client, &probe_paths(&manifests))?;
        install(client, &command, &settings.log_file())?;
        cache.record(&digest)?;
        info!("installed packages into {}", settings.install_dir().display());
        UpdateOutcome::Installed
    };

    materialize(env, &manifests, &settings.install_dir(), &settings.platform, &settings.env_prefix);
    Ok(outcome)
}

fn ensure_dir(path: &Path) -> Result<(), EnsureError> {
    std::fs::create_dir_all(path).map_err(|e| EnsureError::io(path, e))
}
