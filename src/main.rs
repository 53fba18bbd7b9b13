mod cli;
mod execute;

use clap::Parser;
use colored::Colorize;
use crate::cli::CLI;

fn main() {
    let cli = CLI::parse();
    init_logging(&cli);
    if let Err(e) = execute::execute(cli) {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries the environment changes for the shell.
fn init_logging(cli: &CLI) {
    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TOOLDECK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
