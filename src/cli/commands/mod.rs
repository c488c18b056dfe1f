//! CLI command implementations.

pub mod default_config;
pub mod markets;
pub mod stream;
pub mod validate;
