//! Rolling tick history with price change tracking.

use serde::Serialize;
use std::collections::VecDeque;
use tickfeed_core::types::Tick;

/// Ticks retained by [`TickHistory::default`].
pub const DEFAULT_CAPACITY: usize = 500;

/// Movement of the latest price against the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceChange {
    pub price: f64,
    pub change: f64,
    /// Percent of the previous price; 0 without a positive previous price
    pub change_percent: f64,
}

/// Bounded history of received ticks.
#[derive(Debug, Clone)]
pub struct TickHistory {
    ticks: VecDeque<Tick>,
    capacity: usize,
    last_change: Option<PriceChange>,
}

impl Default for TickHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TickHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ticks: VecDeque::with_capacity(capacity),
            capacity,
            last_change: None,
        }
    }

    /// Append a tick, evicting the oldest when full.
    pub fn record(&mut self, tick: Tick) -> PriceChange {
        let change = match self.current_price() {
            Some(previous) => {
                let change = tick.price - previous;
                let change_percent = if previous > 0.0 {
                    change / previous * 100.0
                } else {
                    0.0
                };
                PriceChange {
                    price: tick.price,
                    change,
                    change_percent,
                }
            }
            None => PriceChange {
                price: tick.price,
                change: 0.0,
                change_percent: 0.0,
            },
        };

        if self.ticks.len() == self.capacity {
            self.ticks.pop_front();
        }
        self.ticks.push_back(tick);
        self.last_change = Some(change);
        change
    }

    pub fn current_price(&self) -> Option<f64> {
        self.ticks.back().map(|t| t.price)
    }

    pub fn last_change(&self) -> Option<PriceChange> {
        self.last_change
    }

    pub fn latest(&self) -> Option<&Tick> {
        self.ticks.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tick> {
        self.ticks.iter()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Drop everything, e.g. after switching symbols.
    pub fn clear(&mut self) {
        self.ticks.clear();
        self.last_change = None;
    }
}
