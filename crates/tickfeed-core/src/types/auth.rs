//! Authorization tokens.

use std::fmt;

/// Placeholder credential meaning "no token configured".
pub const PLACEHOLDER_TOKEN: &str = "YOUR_API_KEY";

/// A credential that may be sent to the quote server.
///
/// Construction rejects blank values and the placeholder, so holding an
/// `AuthToken` means the value is worth sending.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Parse a raw token, returning `None` for blank or placeholder values.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == PLACEHOLDER_TOKEN {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never print the secret.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(***)")
    }
}
