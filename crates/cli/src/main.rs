mod cmd;
mod output;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bundlemake_lib::consts::CONFIG_FILENAME;

/// bundlemake - incremental bundler targets
#[derive(Parser)]
#[command(name = "bundlemake")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Bring a target up to date
  Build {
    /// Target to build (default: the bundle target)
    target: Option<String>,

    /// Path to the project configuration
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Give up when the build takes longer than this (e.g. "30s", "2m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Print the build summary as JSON
    #[arg(long)]
    json: bool,
  },

  /// List registered targets
  Targets {
    /// Path to the project configuration
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    config: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .with_ansi(std::io::stderr().is_terminal())
    .without_time()
    .init();

  match cli.command {
    Commands::Build {
      target,
      config,
      timeout,
      json,
    } => cmd::cmd_build(&config, target.as_deref(), timeout, json, cli.verbose),
    Commands::Targets { config } => cmd::cmd_targets(&config),
  }
}
