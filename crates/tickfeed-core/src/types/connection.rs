//! Connection lifecycle and session health types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the transport link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl ConnectionState {
    /// Whether messages may be sent.
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        write!(f, "{}", s)
    }
}

/// State of the realtime session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Not started yet
    #[default]
    Idle,
    /// A connect attempt is in flight
    Connecting,
    /// Link open, subscriptions live
    Connected,
    /// Waiting for a retry timer
    Reconnecting,
    /// Stopped: retries exhausted or session shut down
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Close code and reason reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({})", self.reason, code),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// Connectivity snapshot exposed to the UI layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Link open and the session is live
    pub is_connected: bool,
    /// Last connectivity error, if any
    pub error: Option<String>,
    /// Controller state
    pub state: SessionState,
    /// Symbol currently subscribed on the server
    pub symbol: Option<String>,
}

impl ConnectionStatus {
    /// Retries are exhausted and only a manual reconnect can recover.
    pub fn is_terminal(&self) -> bool {
        self.state == SessionState::Closed && self.error.is_some()
    }
}
