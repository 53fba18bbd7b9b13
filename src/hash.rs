use std::fs;
use std::path::{Path, PathBuf};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use crate::client::EnsureCommand;
use crate::error::EnsureError;

/// Digest file written after a successful install.
pub const DIGEST_FILE_NAME: &str = "packages.sha256";
/// Human-readable record of the last cache decision.
pub const HASH_LOG_NAME: &str = "hash.log";

/// SHA-256 over the NUL-joined command line followed by the lock file bytes,
/// as lowercase hex.
pub fn compute_digest(command: &EnsureCommand, lock_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(command.argv().join("\0").as_bytes());
    hasher.update(lock_bytes);
    hex::encode(hasher.finalize())
}

/// Skips reinstalls when nothing changed since the last successful run.
///
/// The recorded digest is only consulted when the caller opts in to trusting
/// it; packages on disk can change without this tool noticing.
#[derive(Debug, Clone)]
pub struct IntegrityCache {
    digest_file: PathBuf,
    log_file: PathBuf,
}

impl IntegrityCache {
    pub fn new<P: AsRef<Path>>(install_root: P) -> IntegrityCache {
        let root = install_root.as_ref();
        IntegrityCache {
            digest_file: root.join(DIGEST_FILE_NAME),
            log_file: root.join(HASH_LOG_NAME),
        }
    }

    pub fn digest_file(&self) -> &Path {
        &self.digest_file
    }

    /// Returns `true` when `trust` is set and the recorded digest equals `digest`.
    ///
    /// Any problem reading the recorded digest counts as a miss.
    pub fn is_fresh(&self, digest: &str, trust: bool) -> bool {
        let mut log = vec![
            format!("calculated digest: {digest}"),
            format!("hash file path: {}", self.digest_file.display()),
            format!("exists: {}", self.digest_file.is_file()),
            format!("trust_hash: {trust}"),
        ];

        let mut fresh = false;
        if trust && self.digest_file.is_file() {
            match fs::read_to_string(&self.digest_file) {
                Ok(recorded) => {
                    let recorded = recorded.trim();
                    fresh = recorded == digest;
                    log.push(format!("contents: {recorded}"));
                    log.push(format!("equal: {fresh}"));
                }
                Err(e) => {
                    warn!("ignoring unreadable digest {}: {e}", self.digest_file.display());
                    log.push(format!("unreadable: {e}"));
                }
            }
        }
        if let Err(e) = fs::write(&self.log_file, log.join("\n") + "\n") {
            warn!("could not write {}: {e}", self.log_file.display());
        }
        debug!("integrity cache {}", if fresh { "hit" } else { "miss" });
        fresh
    }

    /// Records `digest` as belonging to the current installation.
    pub fn record(&self, digest: &str) -> Result<(), EnsureError> {
        fs::write(&self.digest_file, format!("{digest}\n"))
            .map_err(|e| EnsureError::io(&self.digest_file, e))
    }
}
