//! `blackbox` - back up databases to external storage.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blackbox::config::{resolve_config_path, write_sample_config, Config, DEFAULT_CONFIG_FILE};

/// Back up databases to external storage, rotate old backups and notify.
#[derive(Debug, Parser)]
#[command(name = "blackbox", version, about)]
struct Cli {
    /// Path to the blackbox.yaml file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Generate blackbox.yaml in the current directory and exit
    #[arg(long)]
    init: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.init {
        let path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if write_sample_config(&path).await? {
            println!("{} configuration created", DEFAULT_CONFIG_FILE);
        } else {
            println!("{} already exists", DEFAULT_CONFIG_FILE);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .await
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let success = blackbox::run(&config, &config_path).await?;

    // Non-zero exit when any backup or upload failed
    Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
