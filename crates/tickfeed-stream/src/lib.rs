//! Live market-data streaming.
//!
//! A [`SessionController`] owns one [`Connection`] to the quote server, keeps a
//! single symbol subscribed through the [`Multiplexer`], reconnects with linear
//! backoff under a [`ReconnectPolicy`], and pushes accepted ticks to a
//! [`TickSink`](tickfeed_core::TickSink).

mod connection;
mod multiplexer;
mod reconnect;
mod session;
mod ws;

pub mod memory;

pub use connection::{Connection, ConnectionEvent};
pub use multiplexer::{MessageSink, Multiplexer, PriceCallback};
pub use reconnect::ReconnectPolicy;
pub use session::{
    SessionConfig, SessionController, SessionHandle, DEFAULT_APP_ID, DEFAULT_ENDPOINT,
};
pub use ws::WsTransport;
