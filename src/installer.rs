use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{error, info};
use crate::client::{EnsureCommand, PackageClient};
use crate::error::EnsureError;

/// File name of the install log under the install root.
pub const INSTALL_LOG_NAME: &str = "packages.log";

/// Runs the client's `ensure` with all output captured in `log_path`.
///
/// The log starts with the command line. On a non-zero exit the whole log is
/// returned inside [`EnsureError::InstallFailed`] so the caller can show it.
pub fn install<C: PackageClient>(client: &C, command: &EnsureCommand, log_path: &Path) -> Result<(), EnsureError> {
    info!("installing packages, log at {}", log_path.display());
    let status = {
        let mut log = File::create(log_path).map_err(|e| EnsureError::io(log_path, e))?;
        writeln!(log, "{}", command.display()).map_err(|e| EnsureError::io(log_path, e))?;
        let stderr = log.try_clone().map_err(|e| EnsureError::io(log_path, e))?;
        client.ensure(command, log, stderr)?
    };
    if status.success() {
        return Ok(());
    }

    // Client output is raw bytes; keep whatever is readable.
    let log = match std::fs::read(log_path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("<could not read {}: {e}>", log_path.display()),
    };
    error!("{} exited with {status}", command.program);
    Err(EnsureError::InstallFailed {
        command: command.display(),
        code: status.code(),
        log,
    })
}
