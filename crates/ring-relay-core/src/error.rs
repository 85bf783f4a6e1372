//! Error types for Ring Relay core.

use thiserror::Error;

use crate::types::ParticipantId;

/// Misuse of the ring API, surfaced synchronously to the caller.
///
/// Partial topologies and duplicate deliveries are normal states and never
/// show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// The participant is absent from the current ring order.
    #[error("participant not in ring: {0}")]
    NotInRing(ParticipantId),

    /// The node is not active and may not originate messages.
    #[error("participant not active: {0}")]
    NotActive(ParticipantId),
}
