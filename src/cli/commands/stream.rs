//! Live streaming command.

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tickfeed_config::{load_config, load_from_env, AppConfig};
use tickfeed_core::error::FeedResult;
use tickfeed_core::types::{resolve_market, ConnectionStatus, Tick};
use tickfeed_monitor::{format_status, format_tick, PriceChange, TickHistory};
use tickfeed_stream::{SessionController, SessionHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::{OutputFormat, StreamArgs};

const HELP: &str = "commands: r = reconnect, s <SYMBOL> = switch symbol, m <MARKET> = switch market, a <TOKEN> = authorize, q = quit";

pub async fn run(args: StreamArgs, config_path: &Path) -> Result<()> {
    let config = load_settings(config_path)?;

    let symbol = resolve_symbol(&args, &config)?;
    let token = args.token.clone().or_else(|| config.session.token());

    let session = config.feed.session_config();
    info!(url = %session.url(), symbol = %symbol, "Starting live stream");

    let (tick_tx, mut ticks) = mpsc::unbounded_channel::<Tick>();
    let transport = Arc::new(config.feed.transport());
    let mut controller =
        SessionController::new(session, transport, Arc::new(tick_tx)).with_symbol(symbol);
    if let Some(token) = token {
        controller = controller.with_authorization(token);
    }
    let handle = controller.start();

    if args.format == OutputFormat::Text {
        eprintln!("{}", HELP);
    }

    let mut status = handle.watch_status();
    let mut history = TickHistory::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut received = 0usize;

    loop {
        tokio::select! {
            Some(tick) = ticks.recv() => {
                if history.latest().is_some_and(|t| t.symbol != tick.symbol) {
                    history.clear();
                }
                let change = history.record(tick.clone());
                print_tick(args.format, &tick, &change);

                received += 1;
                if args.count.is_some_and(|n| received >= n) {
                    info!(received, "Tick count reached");
                    break;
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    warn!("Session stopped unexpectedly");
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                print_status(args.format, &snapshot);
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_input(&handle, line.trim())? {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn load_settings(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path).with_context(|| format!("Failed to load {}", path.display()))
    } else {
        info!(path = ?path, "Config file not found, using defaults");
        load_from_env().context("Failed to read configuration from environment")
    }
}

/// Explicit symbol, else the `--market` id, else the configured market.
fn resolve_symbol(args: &StreamArgs, config: &AppConfig) -> FeedResult<String> {
    if let Some(symbol) = &args.symbol {
        return Ok(symbol.clone());
    }
    let id = args.market.as_deref().unwrap_or(&config.session.market);
    resolve_market(id).map(|market| market.symbol.to_string())
}

/// Apply one stdin command. Returns `false` to quit.
fn handle_input(handle: &SessionHandle, input: &str) -> Result<bool> {
    let (command, argument) = match input.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (input, ""),
    };

    match (command, argument) {
        ("", _) => {}
        ("q" | "quit", _) => return Ok(false),
        ("r" | "reconnect", _) => handle.request_reconnect()?,
        ("s" | "symbol", symbol) if !symbol.is_empty() => handle.set_desired_symbol(symbol)?,
        ("m" | "market", id) if !id.is_empty() => match resolve_market(id) {
            Ok(market) => handle.set_desired_symbol(market.symbol)?,
            Err(e) => eprintln!("{}", e),
        },
        ("a" | "auth", token) if !token.is_empty() => handle.set_authorization(token)?,
        _ => eprintln!("{}", HELP),
    }
    Ok(true)
}

fn print_tick(format: OutputFormat, tick: &Tick, change: &PriceChange) {
    match format {
        OutputFormat::Text => println!("{}", format_tick(tick, change)),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "type": "tick",
                "time": tick.time.to_rfc3339(),
                "symbol": tick.symbol,
                "price": tick.price,
                "change": change.change,
                "change_percent": change.change_percent,
            })
        ),
    }
}

fn print_status(format: OutputFormat, status: &ConnectionStatus) {
    match format {
        OutputFormat::Text => eprintln!("status: {}", format_status(status)),
        OutputFormat::Json => println!("{}", json!({ "type": "status", "status": status })),
    }
}
