//! Core data types for the tick feed.

mod auth;
mod connection;
mod market;
mod protocol;
mod tick;

pub use auth::{AuthToken, PLACEHOLDER_TOKEN};
pub use connection::{CloseInfo, ConnectionState, ConnectionStatus, SessionState};
pub use market::{market_by_id, resolve_market, symbol_for_market, Market, MARKETS};
pub use protocol::{InboundMessage, OutboundMessage, ServerError, TickPayload};
pub use tick::Tick;
