mod background;
mod cache;
mod commands;
mod config;
mod db;
mod error;
mod logging;
mod restaurants;
mod worker;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "restaurant-pwa")]
#[command(about = "Offline-first restaurant data and asset caching for the restaurant reviews app")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/restaurant-pwa/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.logging)?;

  commands::run(&config, args.command).await
}
