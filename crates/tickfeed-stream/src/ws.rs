//! Websocket transport over tokio-tungstenite.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tickfeed_core::error::ConnectError;
use tickfeed_core::traits::{Transport, TransportEvent, TransportLink};
use tickfeed_core::types::CloseInfo;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

/// Websocket transport.
///
/// Each link runs a writer task (outbound frames plus keepalive pings) and a
/// reader task (inbound frames until the socket closes).
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
    ping_interval: Duration,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(30))
    }
}

impl WsTransport {
    pub fn new(connect_timeout: Duration, ping_interval: Duration) -> Self {
        Self {
            connect_timeout,
            ping_interval: ping_interval.max(Duration::from_secs(1)),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<TransportLink, ConnectError> {
        let (stream, _) = timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| ConnectError::Timeout(self.connect_timeout))?
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        info!(url, "Websocket connected");

        let (mut ws_tx, mut ws_rx) = stream.split();
        let (writer, mut outbound) = mpsc::unbounded_channel::<String>();
        let (events, reader) = mpsc::unbounded_channel();

        let ping_every = self.ping_interval;
        tokio::spawn(async move {
            let mut ping = interval(ping_every);
            ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ping.tick().await;

            loop {
                tokio::select! {
                    frame = outbound.recv() => match frame {
                        Some(text) => {
                            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                                warn!(error = %e, "Websocket write failed");
                                break;
                            }
                        }
                        None => {
                            debug!("Writer released, closing websocket");
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    _ = ping.tick() => {
                        if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                            warn!(error = %e, "Websocket ping failed");
                            break;
                        }
                    }
                }
            }
        });

        tokio::spawn(async move {
            let close = loop {
                match ws_rx.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(TransportEvent::Text(text)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            if events.send(TransportEvent::Text(text)).is_err() {
                                return;
                            }
                        }
                        Err(_) => warn!("Dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => {
                                CloseInfo::new(Some(u16::from(frame.code)), frame.reason.to_string())
                            }
                            None => CloseInfo::new(None, "closed by server"),
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break CloseInfo::new(None, e.to_string()),
                    None => break CloseInfo::new(None, "stream ended"),
                }
            };
            debug!(%close, "Websocket reader finished");
            let _ = events.send(TransportEvent::Closed(close));
        });

        Ok(TransportLink { writer, reader })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}
