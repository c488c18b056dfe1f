//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use tickfeed_config::load_config;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    match load_config(config_path) {
        Ok(config) => {
            let session = config.feed.session_config();
            println!("Configuration is valid!");
            println!();
            println!("App: {}", config.app.name);
            println!("Environment: {}", config.app.environment);
            println!("Log level: {}", config.logging.level);
            println!("Feed URL: {}", session.url());
            println!(
                "Reconnect: {} attempts, {}ms base delay",
                session.max_reconnect_attempts,
                session.base_reconnect_delay.as_millis()
            );
            println!("Health check: every {}ms", session.health_check_interval.as_millis());
            println!(
                "Market: {} ({})",
                config.session.market,
                config.session.symbol().unwrap_or("unknown")
            );
            println!("Token variable: {}", config.session.token_env);
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
