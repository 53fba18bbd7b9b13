use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop an update run.
///
/// Problems with a previously recorded digest are deliberately absent: they are
/// logged and treated as a cache miss by [`crate::hash::IntegrityCache`].
#[derive(Debug, Error)]
pub enum EnsureError {
    #[error("could not read manifest {}: {source}", path.display())]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed manifest {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{}", access_denied_message(account.as_deref(), paths))]
    AccessDenied {
        account: Option<String>,
        paths: Vec<String>,
    },
    #[error("login to the package service failed")]
    LoginFailed,
    #[error("package client failed ({}): {command}\n{log}", exit_description(*code))]
    InstallFailed {
        command: String,
        code: Option<i32>,
        log: String,
    },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("unsupported operating system: {0}")]
    UnsupportedPlatform(String),
    #[error("could not serialize {what}: {source}")]
    Snapshot {
        what: &'static str,
        source: serde_json::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not serialize config {}: {source}", path.display())]
    ConfigWrite {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

impl EnsureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EnsureError::Io {
            path: path.into(),
            source,
        }
    }
}

fn access_denied_message(account: Option<&str>, paths: &[String]) -> String {
    let account = match account {
        Some(account) => format!("({account}) "),
        None => String::new(),
    };
    let mut message = format!(
        "your account {account}does not have access to the following paths (or they do not exist):"
    );
    for path in paths {
        message.push_str("\n  ");
        message.push_str(path);
    }
    message
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
