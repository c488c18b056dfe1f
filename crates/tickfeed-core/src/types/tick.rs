//! Normalized price ticks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Local receipt time
    pub time: DateTime<Utc>,
    /// Server-side instrument identifier
    pub symbol: String,
    /// Quoted price
    pub price: f64,
}

impl Tick {
    /// Create a tick.
    pub fn new(time: DateTime<Utc>, symbol: impl Into<String>, price: f64) -> Self {
        Self {
            time,
            symbol: symbol.into(),
            price,
        }
    }

    /// Create a tick stamped with the current time.
    pub fn now(symbol: impl Into<String>, price: f64) -> Self {
        Self::new(Utc::now(), symbol, price)
    }

    /// Receipt time as Unix milliseconds.
    pub fn timestamp_millis(&self) -> i64 {
        self.time.timestamp_millis()
    }
}
