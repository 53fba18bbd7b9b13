use std::path::PathBuf;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: ToolDeckCommand,
    /// Config file. Defaults to `./tooldeck.toml`, then the user config file
    #[clap(long, global = true)]
    pub(crate) config: Option<PathBuf>,
    /// Enable debug logging
    #[clap(short, long, global = true)]
    pub(crate) verbose: bool,
    /// Enable trace logging
    #[clap(long, global = true)]
    pub(crate) trace: bool,
}

/// Inputs shared by every command that resolves manifests.
#[derive(Debug, clap::Args, Clone, PartialEq, Default)]
pub struct ResolveArgs {
    /// Manifest to resolve. Repeatable; replaces the configured list
    #[clap(long = "manifest", short = 'm')]
    pub manifests: Vec<PathBuf>,
    /// Install root. Overrides `<prefix>_INSTALL_ROOT`
    #[clap(long)]
    pub install_root: Option<PathBuf>,
    /// Report `mac-arm64` hosts as `mac-amd64`
    #[clap(long)]
    pub rosetta: bool,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum ToolDeckCommand {
    /// Installs or updates all packages and prints the environment changes on stdout
    #[clap(alias = "ensure")]
    Update {
        #[command(flatten)]
        resolve: ResolveArgs,
        /// Download cache passed to the package client
        #[clap(long)]
        cache_dir: Option<PathBuf>,
        /// Package client binary
        #[clap(long)]
        client: Option<String>,
        /// Skip installing if nothing changed since the last successful run
        #[clap(long)]
        trust_hash: bool,
        /// How to print the environment changes
        #[clap(long, value_enum, default_value_t = EnvFormat::Posix)]
        format: EnvFormat,
    },
    /// Lists resolved manifests in resolution order
    Resolve {
        #[command(flatten)]
        resolve: ResolveArgs,
    },
    /// Writes the lock file and package snapshots without installing
    Lock {
        #[command(flatten)]
        resolve: ResolveArgs,
        /// Also print the lock file
        #[clap(long)]
        print: bool,
    },
    /// Prints the platform identifier packages are selected for
    Platform {
        #[clap(long)]
        rosetta: bool,
    },
    /// Writes a default `tooldeck.toml` in the current directory
    Init,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnvFormat {
    Posix,
    Batch,
    Json,
}
