//! Transport trait definition.

use crate::error::ConnectError;
use crate::types::CloseInfo;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Event read from an open link.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A text frame, in arrival order
    Text(String),
    /// The remote end closed or the link failed. Always the last event.
    Closed(CloseInfo),
}

/// Both halves of an open link.
///
/// Dropping `writer` asks the transport to close the link.
#[derive(Debug)]
pub struct TransportLink {
    pub writer: mpsc::UnboundedSender<String>,
    pub reader: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Trait for message-oriented streaming transports.
///
/// Implementations own the socket; callers only see text frames.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a link to `url`.
    ///
    /// # Returns
    /// The link once the remote end accepted it
    async fn open(&self, url: &str) -> Result<TransportLink, ConnectError>;

    /// Get the transport name.
    fn name(&self) -> &str;
}
