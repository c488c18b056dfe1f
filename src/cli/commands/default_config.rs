//! Print default configuration command.

use anyhow::Result;
use tickfeed_config::AppConfig;

pub async fn run() -> Result<()> {
    print!("{}", AppConfig::default().to_toml()?);
    Ok(())
}
