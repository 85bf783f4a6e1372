//! Error types for ring nodes.

use thiserror::Error;

use ring_relay_core::{ParticipantId, RingError};
use ring_relay_transport::TransportError;

/// Errors returned by node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Misuse of the ring API.
    #[error(transparent)]
    Ring(#[from] RingError),

    /// The node could not attach to its transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The node task has stopped.
    #[error("node closed: {0}")]
    Closed(ParticipantId),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
