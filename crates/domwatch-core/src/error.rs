//! Error types for the domwatch system
//!
//! Internal failures (store I/O, lease contention, malformed configuration)
//! travel as [`Error`]. Operator-facing remediation calls never return these
//! directly; they fold them into a structured outcome instead.

use thiserror::Error;

/// Result type alias for domwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the domwatch system
#[derive(Error, Debug)]
pub enum Error {
    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Registrar API errors (transport or non-OK status)
    #[error("Registrar error: {0}")]
    Registrar(String),

    /// Authoritative DNS lookup errors
    #[error("DNS lookup error: {0}")]
    Lookup(String),

    /// A remote call exceeded its request timeout
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Per-key lease could not be acquired
    #[error("Lease unavailable for key {0}")]
    LeaseUnavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a state store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a registrar error
    pub fn registrar(msg: impl Into<String>) -> Self {
        Self::Registrar(msg.into())
    }

    /// Create a DNS lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a lease error
    pub fn lease(key: impl Into<String>) -> Self {
        Self::LeaseUnavailable(key.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Human-readable message without the variant prefix.
    ///
    /// Remediation outcomes carry the upstream text verbatim, so the
    /// registrar's own wording reaches the operator.
    pub fn upstream_message(&self) -> String {
        match self {
            Self::Registrar(msg) | Self::Lookup(msg) | Self::Http(msg) => msg.clone(),
            Self::Timeout(after) => format!("Request timed out after {}s", after.as_secs()),
            other => other.to_string(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn upstream_message_strips_prefix() {
        let err = Error::registrar("Domain not found in account");
        assert_eq!(err.to_string(), "Registrar error: Domain not found in account");
        assert_eq!(err.upstream_message(), "Domain not found in account");
    }

    #[test]
    fn timeout_message_mentions_seconds() {
        let err = Error::Timeout(Duration::from_secs(15));
        assert_eq!(err.upstream_message(), "Request timed out after 15s");
    }
}
