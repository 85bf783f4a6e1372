//! Forward envelopes: the unit exchanged between neighbors.

use serde::{Deserialize, Serialize};

use crate::types::{Direction, MessageId, ParticipantId};

/// Application payload carried around the ring.
///
/// The ring layer never looks inside a payload. Any cloneable, thread-safe
/// type qualifies.
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Send + Sync + 'static {}

/// One copy of a message, addressed to one neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardEnvelope<P> {
    /// Identifier shared by every copy of the message.
    pub message_id: MessageId,
    /// Opaque application message.
    pub payload: P,
    /// Participant that introduced the message to the ring.
    pub origin_id: ParticipantId,
    /// Remaining hop budget after this delivery.
    pub ttl: u32,
    /// Direction this copy is traveling.
    pub direction: Direction,
    /// Neighbor this copy is addressed to.
    pub target_id: ParticipantId,
    /// Creation time at the origin (Unix ms). Informational only.
    pub created_at: i64,
}

impl<P: Clone> ForwardEnvelope<P> {
    /// Build the next-hop copy of this envelope, addressed to `next`.
    ///
    /// Returns `None` once the hop budget is spent.
    pub fn relay(&self, next: ParticipantId) -> Option<Self> {
        let ttl = self.ttl.checked_sub(1)?;
        Some(Self {
            message_id: self.message_id,
            payload: self.payload.clone(),
            origin_id: self.origin_id.clone(),
            ttl,
            direction: self.direction,
            target_id: next,
            created_at: self.created_at,
        })
    }

    /// Whether this copy may still be relayed.
    pub fn can_relay(&self) -> bool {
        self.ttl > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(ttl: u32) -> ForwardEnvelope<String> {
        ForwardEnvelope {
            message_id: MessageId::from_bytes([1; 32]),
            payload: "hello".into(),
            origin_id: ParticipantId::from("p1"),
            ttl,
            direction: Direction::Right,
            target_id: ParticipantId::from("p2"),
            created_at: 0,
        }
    }

    #[test]
    fn test_relay_decrements_ttl() {
        let next = envelope(3).relay(ParticipantId::from("p3")).unwrap();
        assert_eq!(next.ttl, 2);
        assert_eq!(next.target_id, ParticipantId::from("p3"));
        assert_eq!(next.direction, Direction::Right);
        assert_eq!(next.origin_id, ParticipantId::from("p1"));
        assert_eq!(next.message_id, MessageId::from_bytes([1; 32]));
    }

    #[test]
    fn test_relay_stops_at_zero() {
        let env = envelope(0);
        assert!(!env.can_relay());
        assert!(env.relay(ParticipantId::from("p3")).is_none());
    }
}
