//! Error types for scidash-client
//!
//! Fatal conditions surface as `Error`. Recoverable conditions (validation
//! failures, HTTP 400/500 responses) are accumulated in the session error
//! list instead.

use thiserror::Error;

/// Main error type for scidash-client
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unreadable client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Login failed or returned no token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Input could not be turned into a mapping
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Request could not be sent or its body could not be read
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Live and normalized views of a score matrix disagree in length
    #[error("Score matrix views differ in length: {scores} live scores, {normalized} normalized scores")]
    FlattenMismatch { scores: usize, normalized: usize },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedInput(err.to_string())
    }
}

/// Convenience Result type using scidash-client Error
pub type Result<T> = std::result::Result<T, Error>;
