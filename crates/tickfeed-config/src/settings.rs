//! Configuration structures.

use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tickfeed_core::types::market_by_id;
use tickfeed_stream::{SessionConfig, WsTransport, DEFAULT_APP_ID, DEFAULT_ENDPOINT};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

impl AppConfig {
    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.feed.endpoint.as_str();
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(ConfigError::Message(format!(
                "feed.endpoint must be a ws:// or wss:// URL, got '{}'",
                endpoint
            )));
        }
        if self.feed.health_check_interval_ms == 0 {
            return Err(ConfigError::Message(
                "feed.health_check_interval_ms must be positive".to_string(),
            ));
        }
        if self.feed.ping_interval_secs == 0 {
            return Err(ConfigError::Message(
                "feed.ping_interval_secs must be positive".to_string(),
            ));
        }
        if market_by_id(&self.session.market).is_none() {
            return Err(ConfigError::Message(format!(
                "session.market '{}' is not a known market",
                self.session.market
            )));
        }
        Ok(())
    }

    /// Render as a TOML document.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "tickfeed".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Quote server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedSettings {
    pub endpoint: String,
    pub app_id: u32,
    pub max_reconnect_attempts: u32,
    pub base_reconnect_delay_ms: u64,
    pub manual_reconnect_delay_ms: u64,
    pub health_check_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub ping_interval_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_id: DEFAULT_APP_ID,
            max_reconnect_attempts: 5,
            base_reconnect_delay_ms: 1000,
            manual_reconnect_delay_ms: 100,
            health_check_interval_ms: 1000,
            connect_timeout_ms: 10_000,
            ping_interval_secs: 30,
        }
    }
}

impl FeedSettings {
    /// Runtime configuration for the session controller.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoint: self.endpoint.clone(),
            app_id: self.app_id,
            max_reconnect_attempts: self.max_reconnect_attempts,
            base_reconnect_delay: Duration::from_millis(self.base_reconnect_delay_ms),
            manual_reconnect_delay: Duration::from_millis(self.manual_reconnect_delay_ms),
            health_check_interval: Duration::from_millis(self.health_check_interval_ms),
        }
    }

    /// Websocket transport with the configured timeouts.
    pub fn transport(&self) -> WsTransport {
        WsTransport::new(
            Duration::from_millis(self.connect_timeout_ms),
            Duration::from_secs(self.ping_interval_secs),
        )
    }
}

/// What to stream at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// Market id from the built-in table
    pub market: String,
    /// Environment variable holding the API token
    pub token_env: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            market: "volatility-100".to_string(),
            token_env: "DERIV_API_TOKEN".to_string(),
        }
    }
}

impl SessionSettings {
    /// Server symbol of the configured market.
    pub fn symbol(&self) -> Option<&'static str> {
        market_by_id(&self.market).map(|m| m.symbol)
    }

    /// Token read from `token_env`, if set.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_config;
    use std::fs;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.symbol(), Some("R_100"));
        assert_eq!(config.feed.session_config(), SessionConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[feed]"));

        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_partial_file() {
        let path = std::env::temp_dir().join(format!("tickfeed-config-{}.toml", std::process::id()));
        fs::write(
            &path,
            "[feed]\nmax_reconnect_attempts = 2\n\n[session]\nmarket = \"boom-1000\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.feed.max_reconnect_attempts, 2);
        assert_eq!(config.feed.base_reconnect_delay_ms, 1000);
        assert_eq!(config.session.symbol(), Some("BOOM1000"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_logging_format() {
        let mut logging = LoggingConfig::default();
        assert!(!logging.is_json());

        logging.format = "JSON".to_string();
        assert!(logging.is_json());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.feed.endpoint = "https://example.test".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.feed.health_check_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.market = "nowhere".to_string();
        assert!(config.validate().is_err());
    }
}
