use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use regex::Regex;
use tracing::debug;
use crate::error::EnsureError;

/// What `auth-info` reported about the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    pub logged_in: bool,
    pub account: Option<String>,
}

/// Operations the update pipeline needs from the external package client.
///
/// [`CipdClient`] runs the real binary; tests substitute their own.
pub trait PackageClient {
    /// Queries the login state. A failing `auth-info` means "not logged in".
    fn auth_info(&self) -> Result<AuthInfo, EnsureError>;

    /// Lists packages below `path` and returns the combined output.
    fn list(&self, path: &str) -> Result<String, EnsureError>;

    /// Whether `path` has instances the current identity can see.
    fn instances(&self, path: &str) -> Result<bool, EnsureError>;

    /// Attempts an interactive login. Returns `false` if the login failed.
    fn login(&self) -> Result<bool, EnsureError>;

    /// Runs `command` with its output streams redirected to the given files.
    fn ensure(&self, command: &EnsureCommand, stdout: File, stderr: File) -> Result<ExitStatus, EnsureError>;
}

/// The full `ensure` invocation. Its argument order feeds the integrity digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Inputs to [`EnsureCommand::new`].
#[derive(Debug, Clone)]
pub struct EnsureArgs<'a> {
    pub lock_file: &'a Path,
    pub install_dir: &'a Path,
    pub json_output: &'a Path,
    pub cache_dir: Option<&'a Path>,
    pub service_account: Option<&'a Path>,
}

impl EnsureCommand {
    pub fn new(program: &str, args: EnsureArgs<'_>) -> EnsureCommand {
        let mut argv = vec![
            "ensure".to_string(),
            "-ensure-file".to_string(),
            args.lock_file.to_string_lossy().to_string(),
            "-root".to_string(),
            args.install_dir.to_string_lossy().to_string(),
            "-log-level".to_string(),
            "debug".to_string(),
            "-json-output".to_string(),
            args.json_output.to_string_lossy().to_string(),
            // 0 means one thread per CPU
            "-max-threads".to_string(),
            "0".to_string(),
        ];
        if let Some(cache_dir) = args.cache_dir {
            argv.push("-cache-dir".to_string());
            argv.push(cache_dir.to_string_lossy().to_string());
        }
        if let Some(account) = args.service_account {
            argv.push("-service-account-json".to_string());
            argv.push(account.to_string_lossy().to_string());
        }
        EnsureCommand { program: program.to_string(), args: argv }
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    pub fn display(&self) -> String {
        self.argv().join(" ")
    }
}

/// Drives a `cipd`-compatible binary through subprocesses.
#[derive(Debug, Clone)]
pub struct CipdClient {
    binary: PathBuf,
    service_account: Option<PathBuf>,
}

impl CipdClient {
    pub fn new<P: Into<PathBuf>>(binary: P, service_account: Option<PathBuf>) -> CipdClient {
        CipdClient { binary: binary.into(), service_account }
    }

    fn command(&self, subcommand: &[&str], path: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(subcommand);
        if let Some(account) = &self.service_account {
            cmd.arg("-service-account-json").arg(account);
        }
        if let Some(path) = path {
            cmd.arg(path);
        }
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> EnsureError {
        EnsureError::Spawn {
            program: self.binary.to_string_lossy().to_string(),
            source,
        }
    }

    fn combined_output(&self, mut cmd: Command) -> Result<(bool, String), EnsureError> {
        debug!("running {:?}", cmd);
        let output = cmd.stdin(Stdio::null()).output().map_err(|e| self.spawn_error(e))?;
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((output.status.success(), text))
    }
}

impl PackageClient for CipdClient {
    fn auth_info(&self) -> Result<AuthInfo, EnsureError> {
        let (success, output) = self.combined_output(self.command(&["auth-info"], None))?;
        if !success {
            return Ok(AuthInfo::default());
        }
        Ok(AuthInfo { logged_in: true, account: parse_account(&output) })
    }

    fn list(&self, path: &str) -> Result<String, EnsureError> {
        // `ls` exits non-zero only when the server is unreachable, so the
        // status carries no access information.
        let (_, output) = self.combined_output(self.command(&["ls", "-h"], Some(path)))?;
        Ok(output)
    }

    fn instances(&self, path: &str) -> Result<bool, EnsureError> {
        let (success, _) = self.combined_output(self.command(&["instances"], Some(path)))?;
        Ok(success)
    }

    fn login(&self) -> Result<bool, EnsureError> {
        // Interactive, but stdout is reserved for the environment output.
        let status = self
            .command(&["auth-login"], None)
            .stdout(std::io::stderr())
            .status()
            .map_err(|e| self.spawn_error(e))?;
        Ok(status.success())
    }

    fn ensure(&self, command: &EnsureCommand, stdout: File, stderr: File) -> Result<ExitStatus, EnsureError> {
        Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|source| EnsureError::Spawn { program: command.program.clone(), source })
    }
}

/// Extracts the account from `Logged in as <account>.`.
pub fn parse_account(output: &str) -> Option<String> {
    let re = Regex::new(r"Logged in as (\S*)\.").ok()?;
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
