//! Error types for Ring Relay.

use ring_relay_core::{ParticipantId, RingError};
use ring_relay_node::NodeError;
use ring_relay_transport::TransportError;
use thiserror::Error;

/// Errors that can occur during coordinator operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Node error.
    #[error("node error: {0}")]
    Node(#[from] NodeError),

    /// Ring misuse, such as addressing a participant outside the ring.
    #[error(transparent)]
    Ring(#[from] RingError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The participant is marked unreachable and awaiting reconciliation.
    #[error("participant unreachable: {0}")]
    Unreachable(ParticipantId),
}

/// Result type for Ring Relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
