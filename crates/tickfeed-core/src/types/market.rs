//! Built-in market table.

use crate::error::{FeedError, FeedResult};
use serde::Serialize;

/// A tradable market and the server symbol that streams it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Market {
    /// Dashboard identifier
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Server-side symbol
    pub symbol: &'static str,
    pub description: &'static str,
}

/// Markets offered by the dashboard.
pub const MARKETS: &[Market] = &[
    Market {
        id: "volatility-100",
        name: "Volatility 100 Index",
        symbol: "R_100",
        description: "Constant volatility of 100% with a tick every 2 seconds",
    },
    Market {
        id: "volatility-75",
        name: "Volatility 75 Index",
        symbol: "R_75",
        description: "Constant volatility of 75% with a tick every 2 seconds",
    },
    Market {
        id: "volatility-50",
        name: "Volatility 50 Index",
        symbol: "R_50",
        description: "Constant volatility of 50% with a tick every 2 seconds",
    },
    Market {
        id: "boom-1000",
        name: "Boom 1000 Index",
        symbol: "BOOM1000",
        description: "Simulates a market with constant upward spikes",
    },
    Market {
        id: "crash-1000",
        name: "Crash 1000 Index",
        symbol: "CRASH1000",
        description: "Simulates a market with constant downward spikes",
    },
];

/// Look up a market by its dashboard id.
pub fn market_by_id(id: &str) -> Option<&'static Market> {
    MARKETS.iter().find(|m| m.id == id)
}

/// Like [`market_by_id`], but an unknown id is an error.
pub fn resolve_market(id: &str) -> FeedResult<&'static Market> {
    market_by_id(id).ok_or_else(|| FeedError::UnknownMarket(id.to_string()))
}

/// Map a dashboard market id to its server symbol.
pub fn symbol_for_market(id: &str) -> Option<&'static str> {
    market_by_id(id).map(|m| m.symbol)
}
