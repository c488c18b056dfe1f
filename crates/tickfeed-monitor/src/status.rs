//! Human-readable status and tick lines.

use crate::tick_history::PriceChange;
use tickfeed_core::types::{ConnectionStatus, Tick};

/// One-line summary of a connection status.
pub fn format_status(status: &ConnectionStatus) -> String {
    let mut line = if status.is_connected {
        "connected".to_string()
    } else {
        status.state.to_string()
    };
    if let Some(symbol) = &status.symbol {
        line.push_str(&format!(" [{}]", symbol));
    }
    if let Some(error) = &status.error {
        line.push_str(&format!(": {}", error));
    }
    if status.is_terminal() {
        line.push_str(" (press 'r' to reconnect)");
    }
    line
}

/// Tick line with signed change, e.g. `12:00:01.250 R_100 1234.5600 +0.0100 (+0.00%)`.
pub fn format_tick(tick: &Tick, change: &PriceChange) -> String {
    format!(
        "{} {} {:.4} {:+.4} ({:+.2}%)",
        tick.time.format("%H:%M:%S%.3f"),
        tick.symbol,
        tick.price,
        change.change,
        change.change_percent
    )
}
