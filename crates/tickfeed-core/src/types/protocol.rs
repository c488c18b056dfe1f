//! Quote server wire protocol.
//!
//! Outbound requests are flat JSON objects; inbound frames are JSON objects
//! tagged by `msg_type`, any of which may carry an `error` payload instead of
//! its regular body.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// Requests sent to the quote server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// `{"authorize": "<token>"}`
    Authorize { authorize: String },
    /// `{"ticks": "<symbol>", "subscribe": 1}`
    SubscribeTicks { ticks: String, subscribe: u8 },
    /// `{"forget_all": "ticks"}`
    ForgetAll { forget_all: String },
}

impl OutboundMessage {
    pub fn authorize(token: impl Into<String>) -> Self {
        OutboundMessage::Authorize {
            authorize: token.into(),
        }
    }

    pub fn subscribe_ticks(symbol: impl Into<String>) -> Self {
        OutboundMessage::SubscribeTicks {
            ticks: symbol.into(),
            subscribe: 1,
        }
    }

    /// Cancel every tick stream on the link.
    pub fn forget_all_ticks() -> Self {
        OutboundMessage::ForgetAll {
            forget_all: "ticks".to_string(),
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Authorize { .. } => "authorize",
            OutboundMessage::SubscribeTicks { .. } => "ticks",
            OutboundMessage::ForgetAll { .. } => "forget_all",
        }
    }
}

/// Error payload reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Body of a `tick` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickPayload {
    pub symbol: String,
    /// Kept raw so a malformed quote drops the tick, not the frame.
    #[serde(default)]
    pub quote: serde_json::Value,
    #[serde(default)]
    pub epoch: Option<i64>,
}

impl TickPayload {
    /// Numeric price, if the quote is a finite number.
    pub fn price(&self) -> Option<f64> {
        self.quote.as_f64().filter(|p| p.is_finite())
    }
}

/// Frames received from the quote server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Tick(TickPayload),
    Authorized { login_id: Option<String> },
    Error { msg_type: String, error: ServerError },
    Other { msg_type: String },
}

#[derive(Deserialize)]
struct RawFrame {
    msg_type: Option<String>,
    #[serde(default)]
    error: Option<ServerError>,
    #[serde(default)]
    tick: Option<TickPayload>,
    #[serde(default)]
    authorize: Option<serde_json::Value>,
}

impl InboundMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawFrame =
            serde_json::from_str(text).map_err(|e| ProtocolError::Json(e.to_string()))?;
        let msg_type = raw.msg_type.ok_or(ProtocolError::MissingType)?;

        if let Some(error) = raw.error {
            return Ok(InboundMessage::Error { msg_type, error });
        }

        match msg_type.as_str() {
            "tick" => raw
                .tick
                .map(InboundMessage::Tick)
                .ok_or(ProtocolError::MissingField {
                    msg_type,
                    field: "tick",
                }),
            "authorize" => {
                let login_id = raw
                    .authorize
                    .as_ref()
                    .and_then(|a| a.get("loginid"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                Ok(InboundMessage::Authorized { login_id })
            }
            _ => Ok(InboundMessage::Other { msg_type }),
        }
    }

    /// The `msg_type` tag of this frame.
    pub fn msg_type(&self) -> &str {
        match self {
            InboundMessage::Tick(_) => "tick",
            InboundMessage::Authorized { .. } => "authorize",
            InboundMessage::Error { msg_type, .. } | InboundMessage::Other { msg_type } => {
                msg_type
            }
        }
    }
}
