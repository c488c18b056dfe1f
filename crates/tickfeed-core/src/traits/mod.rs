//! Core traits for the tick feed.

mod sink;
mod transport;

pub use sink::TickSink;
pub use transport::{Transport, TransportEvent, TransportLink};
