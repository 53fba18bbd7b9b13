use std::path::Path;
use anyhow::{bail, Result};
use tooldeck::client::CipdClient;
use tooldeck::config::{Config, CONFIG_FILE_NAME};
use tooldeck::env::EnvChanges;
use tooldeck::manifest::resolve_manifests;
use tooldeck::platform::Platform;
use tooldeck::update::{update, write_lock, Settings, UpdateOptions, UpdateOutcome};
use crate::cli::{EnvFormat, ResolveArgs, ToolDeckCommand, CLI};

pub fn execute(cli: CLI) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        ToolDeckCommand::Init => {
            execute_init()
        }
        ToolDeckCommand::Platform { rosetta } => {
            execute_platform(rosetta)
        }
        ToolDeckCommand::Update { resolve, cache_dir, client, trust_hash, format } => {
            let config = Config::locate(config_path.as_deref())?;
            let mut options = options(&config, &resolve);
            if cache_dir.is_some() {
                options.cache_dir = cache_dir;
            }
            if let Some(client) = client {
                options.client_binary = client;
            }
            options.trust_hash |= trust_hash;
            execute_update(options, format)
        }
        ToolDeckCommand::Resolve { resolve } => {
            let config = Config::locate(config_path.as_deref())?;
            execute_resolve(options(&config, &resolve))
        }
        ToolDeckCommand::Lock { resolve, print } => {
            let config = Config::locate(config_path.as_deref())?;
            execute_lock(options(&config, &resolve), print)
        }
    }
}

/// Layers command line arguments over the config file.
fn options(config: &Config, args: &ResolveArgs) -> UpdateOptions {
    let mut options = UpdateOptions::from_config(config);
    if !args.manifests.is_empty() {
        options.manifests = args.manifests.clone();
    }
    if args.install_root.is_some() {
        options.install_root = args.install_root.clone();
    }
    options.rosetta |= args.rosetta;
    options
}

fn settings(options: &UpdateOptions, env: &EnvChanges) -> Result<Settings> {
    if options.manifests.is_empty() {
        bail!("No manifests given. Pass --manifest or list them in {CONFIG_FILE_NAME}.");
    }
    Ok(options.resolve(env)?)
}

pub fn execute_update(options: UpdateOptions, format: EnvFormat) -> Result<()> {
    let mut env = EnvChanges::new();
    let settings = settings(&options, &env)?;
    let client = CipdClient::new(&settings.client_binary, settings.service_account.clone());
    let outcome = update(&client, &settings, &mut env)?;
    if outcome == UpdateOutcome::UpToDate {
        eprintln!("Packages up to date");
    }
    match format {
        EnvFormat::Posix => print!("{}", env.to_posix()),
        EnvFormat::Batch => print!("{}", env.to_batch()),
        EnvFormat::Json => println!("{}", env.to_json()?),
    }
    Ok(())
}

pub fn execute_resolve(options: UpdateOptions) -> Result<()> {
    let settings = settings(&options, &EnvChanges::new())?;
    for resolved in resolve_manifests(&settings.manifests)? {
        println!("{}", resolved.path.display());
    }
    Ok(())
}

pub fn execute_lock(options: UpdateOptions, print: bool) -> Result<()> {
    let settings = settings(&options, &EnvChanges::new())?;
    let (manifests, lock) = write_lock(&settings)?;
    if print {
        print!("{}", String::from_utf8_lossy(&lock));
    } else {
        println!(
            "Wrote {} for {} ({} manifests)",
            settings.lock_file().display(),
            settings.platform,
            manifests.len()
        );
    }
    Ok(())
}

pub fn execute_platform(rosetta: bool) -> Result<()> {
    println!("{}", Platform::detect(rosetta)?);
    Ok(())
}

pub fn execute_init() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);
    if path.exists() {
        bail!("{CONFIG_FILE_NAME} already exists");
    }
    Config::default().save(path)?;
    Ok(())
}
