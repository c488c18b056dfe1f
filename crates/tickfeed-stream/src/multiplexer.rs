//! Single-symbol subscription multiplexer.
//!
//! The dashboard trades one instrument at a time, so at most one subscription
//! is active. Switching symbols cancels the old stream on the server before
//! the new one is requested, and inbound ticks are checked against the active
//! symbol so a late tick from the old market never reaches the new callback.

use tickfeed_core::error::SendError;
use tickfeed_core::types::{InboundMessage, OutboundMessage};
use tracing::{debug, info, trace, warn};

/// Callback receiving the price of every accepted tick.
pub type PriceCallback = Box<dyn FnMut(f64) + Send>;

/// Anything that can transmit outbound requests.
pub trait MessageSink {
    fn send(&self, message: &OutboundMessage) -> Result<(), SendError>;
}

struct Subscription {
    symbol: String,
    on_price: PriceCallback,
}

/// Routes inbound ticks to the one active subscription.
#[derive(Default)]
pub struct Multiplexer {
    active: Option<Subscription>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbol of the active subscription.
    pub fn active_symbol(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.symbol.as_str())
    }

    /// Make `symbol` the active subscription.
    ///
    /// A different active symbol is torn down first (`forget_all`), then the
    /// new stream is requested and `on_price` installed. Subscribing to the
    /// active symbol again does nothing.
    ///
    /// # Returns
    /// Whether a new subscription was installed
    pub fn subscribe<S: MessageSink + ?Sized>(
        &mut self,
        sink: &S,
        symbol: &str,
        on_price: PriceCallback,
    ) -> bool {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            warn!("Ignoring subscribe with empty symbol");
            return false;
        }
        if self.active_symbol() == Some(symbol) {
            debug!(symbol, "Already subscribed");
            return false;
        }

        if let Some(previous) = self.active.take() {
            debug!(symbol = %previous.symbol, "Forgetting previous tick stream");
            if let Err(e) = sink.send(&OutboundMessage::forget_all_ticks()) {
                warn!(error = %e, "Failed to cancel previous tick stream");
            }
        }

        if let Err(e) = sink.send(&OutboundMessage::subscribe_ticks(symbol)) {
            warn!(symbol, error = %e, "Failed to request tick stream");
        }
        self.active = Some(Subscription {
            symbol: symbol.to_string(),
            on_price,
        });
        info!("Subscribed to {}", symbol);
        true
    }

    /// Cancel every tick stream and clear the active subscription.
    pub fn unsubscribe_all<S: MessageSink + ?Sized>(&mut self, sink: &S) {
        if let Err(e) = sink.send(&OutboundMessage::forget_all_ticks()) {
            warn!(error = %e, "Failed to cancel tick streams");
        }
        if let Some(previous) = self.active.take() {
            info!("Unsubscribed from {}", previous.symbol);
        }
    }

    /// Forget the active subscription without telling the server.
    ///
    /// Used when the link is replaced: a fresh server session has no streams.
    pub fn reset(&mut self) {
        if let Some(previous) = self.active.take() {
            debug!(symbol = %previous.symbol, "Subscription reset");
        }
    }

    /// Deliver a tick frame to the active callback.
    ///
    /// # Returns
    /// Whether the callback was invoked
    pub fn route_inbound(&mut self, message: &InboundMessage) -> bool {
        let InboundMessage::Tick(tick) = message else {
            return false;
        };
        let Some(active) = self.active.as_mut() else {
            trace!(symbol = %tick.symbol, "Dropping tick, no active subscription");
            return false;
        };
        if tick.symbol != active.symbol {
            trace!(symbol = %tick.symbol, active = %active.symbol, "Dropping tick for inactive symbol");
            return false;
        }

        match tick.price() {
            Some(price) => {
                (active.on_price)(price);
                true
            }
            None => {
                warn!(symbol = %tick.symbol, quote = %tick.quote, "Dropping tick with non-numeric quote");
                false
            }
        }
    }
}
