//! Logging, tick history and status reporting.

mod logging;
mod status;
mod tick_history;

pub use logging::setup_logging;
pub use status::{format_status, format_tick};
pub use tick_history::{PriceChange, TickHistory, DEFAULT_CAPACITY};
