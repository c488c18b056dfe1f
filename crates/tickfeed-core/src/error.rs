//! Error types for the tick feed.

use crate::types::ConnectionState;
use std::time::Duration;
use thiserror::Error;

/// Top-level feed error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Session is no longer running")]
    SessionStopped,
}

/// Failure to establish a transport link.
///
/// `Clone` so that a single in-flight attempt can settle every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connect attempt cancelled")]
    Cancelled,
}

/// Outbound message that was not transmitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Connection is not open (state: {0})")]
    NotOpen(ConnectionState),

    #[error("Failed to encode message: {0}")]
    Encode(String),
}

/// Inbound frame that could not be understood.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Frame has no msg_type")]
    MissingType,

    #[error("{msg_type} frame is missing field '{field}'")]
    MissingField {
        msg_type: String,
        field: &'static str,
    },
}

/// Result type alias for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;
