//! Error types for the transport layer.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while publishing or subscribing.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The underlying channel or service is not reachable right now.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// A send did not complete in time.
    #[error("transport timed out after {0:?}")]
    Timeout(Duration),

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,

    /// An envelope could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl TransportError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Unavailable(_) | TransportError::Timeout(_))
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
