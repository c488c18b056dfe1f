//! Configuration management.

mod settings;

pub use settings::{AppConfig, AppSettings, FeedSettings, LoggingConfig, SessionSettings};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

fn environment() -> Environment {
    Environment::with_prefix("TICKFEED")
        .separator("__")
        .try_parsing(true)
}

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(environment())
        .build()?;

    let config: AppConfig = config.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Load defaults overlaid with environment variables only.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    let config: AppConfig = Config::builder()
        .add_source(environment())
        .build()?
        .try_deserialize()?;
    config.validate()?;
    Ok(config)
}
