//! Threat Info Gateway CLI.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use threat_info_gateway::{logging, server, Config};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "threat-info-gateway")]
#[command(about = "Authenticated gateway serving IP reputation info from AbuseIPDB")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "threat-info.yaml")]
    config: PathBuf,

    /// Also print logs to stdout when a log file is configured
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // The log file location comes from the config, so load it first
    let config = Config::load(&args.config)?;

    // Handle --validate
    if args.validate {
        println!("Configuration is valid");
        return Ok(());
    }

    logging::init(config.log_file.as_deref(), &args.log_level, args.verbose)?;

    info!(config = %args.config.display(), "Program launched");

    server::run(config).await
}
