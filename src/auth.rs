use tracing::{debug, info, warn};
use crate::client::PackageClient;
use crate::error::EnsureError;
use crate::manifest::ResolvedManifest;

/// Probing is an expensive RPC, so only this many packages per manifest are checked.
pub const PROBES_PER_MANIFEST: usize = 3;

const NO_MATCHING_PACKAGES: &str = "No matching packages";

/// Where the access check currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    CheckingAccess,
    AttemptingLogin(Vec<String>),
    Verified,
    Denied(Vec<String>),
}

/// Picks the namespace prefixes to probe: the first few packages of each
/// manifest, with trailing `${...}` segments removed. Duplicates are dropped.
pub fn probe_paths(manifests: &[ResolvedManifest]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for resolved in manifests {
        for package in resolved.manifest.packages.iter().take(PROBES_PER_MANIFEST) {
            let mut parts: Vec<&str> = package.path.split('/').collect();
            while parts.last().is_some_and(|part| part.contains("${")) {
                parts.pop();
            }
            let prefix = parts.join("/");
            if !prefix.is_empty() && !paths.contains(&prefix) {
                paths.push(prefix);
            }
        }
    }
    paths
}

/// Returns the paths the current identity can't reach.
///
/// `ls` reports "No matching packages" both for leaf packages and for paths
/// we can't see, so those get a second look with `instances`.
pub fn inaccessible_paths<C: PackageClient>(client: &C, paths: &[String]) -> Result<Vec<String>, EnsureError> {
    let mut denied = Vec::new();
    for path in paths {
        let listing = client.list(path)?;
        if !listing.contains(NO_MATCHING_PACKAGES) {
            continue;
        }
        if !client.instances(path)? {
            debug!("no access to {path}");
            denied.push(path.clone());
        }
    }
    Ok(denied)
}

/// Verifies read access to `paths`, logging in once if that could help.
///
/// # Errors
/// [`EnsureError::LoginFailed`] if the login attempt fails and
/// [`EnsureError::AccessDenied`] if paths remain inaccessible.
pub fn verify_access<C: PackageClient>(client: &C, paths: &[String]) -> Result<(), EnsureError> {
    let auth = client.auth_info()?;
    let mut state = AuthState::CheckingAccess;
    let mut login_attempted = false;
    loop {
        state = match state {
            AuthState::CheckingAccess => {
                let denied = inaccessible_paths(client, paths)?;
                if denied.is_empty() {
                    AuthState::Verified
                } else if !auth.logged_in && !login_attempted {
                    AuthState::AttemptingLogin(denied)
                } else {
                    AuthState::Denied(denied)
                }
            }
            AuthState::AttemptingLogin(denied) => {
                warn!("not logged in and no anonymous access to:");
                for path in &denied {
                    warn!("  {path}");
                }
                info!("attempting login");
                login_attempted = true;
                // With a service account, login is a no-op on the client side.
                if !client.login()? {
                    return Err(EnsureError::LoginFailed);
                }
                AuthState::CheckingAccess
            }
            AuthState::Verified => return Ok(()),
            AuthState::Denied(paths) => {
                return Err(EnsureError::AccessDenied { account: auth.account, paths });
            }
        };
    }
}
