//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tickfeed_config::LoggingConfig;

#[derive(Parser)]
#[command(name = "tickfeed")]
#[command(author, version, about = "Live market-data connection manager")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level [default: logging.level from the config file]
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    /// Also append logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Effective logging options.
#[derive(Debug, PartialEq)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl Cli {
    /// Command-line flags override the `[logging]` section.
    pub fn log_settings(&self, config: &LoggingConfig) -> LogSettings {
        LogSettings {
            level: match &self.log_level {
                Some(level) => level.as_str().to_string(),
                None => config.level.clone(),
            },
            json: self.json_logs || config.is_json(),
            file: self
                .log_file
                .clone()
                .or_else(|| config.file.as_ref().map(PathBuf::from)),
        }
    }
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream live ticks for one market
    Stream(StreamArgs),
    /// List built-in markets
    Markets,
    /// Validate configuration
    ValidateConfig,
    /// Print the default configuration as TOML
    DefaultConfig,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
pub struct StreamArgs {
    /// Market id from the built-in table (see `markets`)
    #[arg(short, long, conflicts_with = "symbol")]
    pub market: Option<String>,

    /// Raw server symbol, e.g. R_100
    #[arg(short = 'S', long)]
    pub symbol: Option<String>,

    /// API token; defaults to the variable named by session.token_env
    #[arg(long)]
    pub token: Option<String>,

    /// Stop after this many ticks
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}
