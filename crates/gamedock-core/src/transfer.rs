//! Transfer credentials and failure classification.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Account used by the transfer tool. `None` at call sites means anonymous.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Classified reason a transfer ended without success.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferFailure {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Rate limited by the content service, try again later")]
    RateLimited,

    #[error("Access denied: the account does not own this title")]
    AccessDenied,

    #[error("Second-factor code required")]
    SecondFactorRequired,

    #[error("Failed to start transfer tool: {message}")]
    SpawnFailed { message: String },

    #[error("Transfer tool exited with code {code}")]
    NonZeroExit { code: i32 },

    #[error("Transfer failed: {message}")]
    Unknown { message: String },
}

impl TransferFailure {
    /// Create a spawn failure.
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            message: message.into(),
        }
    }

    /// Create an unclassified failure.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("gabe", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("gabe"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn failure_messages() {
        assert_eq!(
            TransferFailure::NonZeroExit { code: 8 }.to_string(),
            "Transfer tool exited with code 8"
        );
        let json = serde_json::to_value(TransferFailure::RateLimited).unwrap();
        assert_eq!(json["kind"], "rate_limited");
    }
}
