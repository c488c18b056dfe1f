//! Core types and traits for the tick feed.
//!
//! This crate provides the foundational building blocks including:
//! - Tick and connection status types
//! - The quote server wire protocol (outbound requests, inbound frames)
//! - The built-in market table
//! - Traits for transports and tick sinks

pub mod types;
pub mod traits;
pub mod error;

pub use error::{FeedError, FeedResult};
pub use types::*;
pub use traits::*;
