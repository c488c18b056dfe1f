//! Live market-data streaming CLI.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use tickfeed_config::{load_config, load_from_env, LoggingConfig};
use tickfeed_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let logging = logging_config(&cli.config);
    let settings = cli.log_settings(&logging);
    let _log_guard = setup_logging(&settings.level, settings.json, settings.file.as_deref());

    // Execute command
    match cli.command {
        Commands::Stream(args) => cli::commands::stream::run(args, &cli.config).await,
        Commands::Markets => cli::commands::markets::run().await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
        Commands::DefaultConfig => cli::commands::default_config::run().await,
    }
}

/// The `[logging]` section, or defaults when the config cannot be read yet.
/// Commands report configuration errors themselves once logging is up.
fn logging_config(path: &Path) -> LoggingConfig {
    let loaded = if path.exists() {
        load_config(path)
    } else {
        load_from_env()
    };
    loaded.map(|config| config.logging).unwrap_or_default()
}
