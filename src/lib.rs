//! # Tooldeck Core Library
//!
//! This crate contains the core logic of the `tooldeck` tool: it turns a set of
//! prebuilt-tool package manifests into a lock file for an external
//! content-addressed package client, drives that client, and reports where
//! everything was installed as environment changes for the calling shell.
//!
//! ## Modules Overview
//! - [`manifest`] – Loading manifests, following includes, namespacing packages
//! - [`dedup`] – Last-write-wins deduplication of the aggregated package list
//! - [`lock`] – Lock file rendering and diagnostic snapshots
//! - [`platform`] – The `<os>-<arch>` platform identifier
//! - [`hash`] – Digest of command line + lock file, used to skip reinstalls
//! - [`auth`] – Access verification with a single login retry
//! - [`client`] – The external package client seam
//! - [`installer`] – Running the client with captured logs
//! - [`env`] – Environment sink and PATH / directory variable export
//! - [`update`] – The end-to-end pipeline
//! - [`config`] – `tooldeck.toml` configuration


pub mod manifest;
pub mod dedup;
pub mod lock;
pub mod platform;
pub mod hash;
pub mod auth;
pub mod client;
pub mod installer;
pub mod env;
pub mod update;
pub mod config;
pub mod error;

pub use manifest::*;
pub use dedup::*;
pub use lock::*;
pub use platform::*;
pub use hash::*;
pub use auth::*;
pub use client::*;
pub use installer::*;
pub use env::*;
pub use update::*;
pub use config::*;
pub use error::*;
