//! Common error types for the GDS results browser

use thiserror::Error;

/// Common result type for GDSR operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the engine and its API adapters
///
/// None of these are fatal to the process: the worst outcome is a view
/// showing stale or empty data plus a notification.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure talking to the results service
    #[error("Network error: {0}")]
    Network(String),

    /// Results service answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Image response length does not match the requested layout refs
    #[error("Image count mismatch: requested {expected}, received {received}")]
    ImageMismatch { expected: usize, received: usize },

    /// Incomplete or contradictory range filter (never reaches the network)
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error is a transient network/API failure
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Api { .. })
    }
}
