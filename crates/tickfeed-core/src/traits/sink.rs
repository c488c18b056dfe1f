//! Tick sink trait definition.

use crate::types::Tick;
use tokio::sync::mpsc;

/// Consumer of accepted price ticks.
pub trait TickSink: Send + Sync {
    /// Called once for every accepted tick, in arrival order.
    fn on_tick(&self, tick: Tick);
}

impl TickSink for mpsc::UnboundedSender<Tick> {
    fn on_tick(&self, tick: Tick) {
        // Receiver gone means the application stopped listening.
        let _ = self.send(tick);
    }
}

impl<T: TickSink + ?Sized> TickSink for std::sync::Arc<T> {
    fn on_tick(&self, tick: Tick) {
        (**self).on_tick(tick)
    }
}
