//! Strong type definitions for Ring Relay.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a session participant.
///
/// Participant identifiers are assigned by the session layer and are opaque
/// here. Their ordering is used as the tie-break when two participants
/// joined at the same instant.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a participant ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A 32-byte message identifier.
///
/// Fresh identifiers are random; callers that already own an identifier
/// scheme can build one with [`MessageId::from_bytes`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub [u8; 32]);

impl MessageId {
    /// Create a new MessageId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random message ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl From<[u8; 32]> for MessageId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Liveness of a participant as reported by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Liveness {
    Active,
    Inactive,
}

/// A session participant, as seen by the ring layer.
///
/// Owned by session management; the ring layer only reads it to compute
/// ring order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Join time (Unix ms).
    pub joined_at: i64,
    /// Current liveness.
    pub liveness: Liveness,
}

impl Participant {
    /// Create an active participant.
    pub fn active(id: impl Into<ParticipantId>, joined_at: i64) -> Self {
        Self {
            id: id.into(),
            joined_at,
            liveness: Liveness::Active,
        }
    }

    /// Create an inactive participant.
    pub fn inactive(id: impl Into<ParticipantId>, joined_at: i64) -> Self {
        Self {
            id: id.into(),
            joined_at,
            liveness: Liveness::Inactive,
        }
    }

    /// Check whether this participant takes part in the ring.
    pub fn is_active(&self) -> bool {
        self.liveness == Liveness::Active
    }
}

/// Rotational direction around the ring.
///
/// Also names the side of a node a neighbor sits on: the left neighbor is
/// reached by traveling `Left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Both directions, left first.
    pub const BOTH: [Direction; 2] = [Direction::Left, Direction::Right];

    /// The other direction.
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => f.write_str("left"),
            Direction::Right => f.write_str("right"),
        }
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_hex_roundtrip() {
        let id = MessageId::from_bytes([0x42; 32]);
        let recovered = MessageId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_message_id_display() {
        let id = MessageId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "abababababababab");
    }

    #[test]
    fn test_message_id_from_hex_wrong_length() {
        assert!(MessageId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_random_message_ids_differ() {
        assert_ne!(MessageId::random(), MessageId::random());
    }

    #[test]
    fn test_participant_id_ordering() {
        assert!(ParticipantId::from("a") < ParticipantId::from("b"));
        assert_eq!(ParticipantId::from("p1").to_string(), "p1");
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::Left.opposite(), Direction::Right);
        assert_eq!(Direction::Right.opposite(), Direction::Left);
    }

    #[test]
    fn test_participant_serde() {
        let p = Participant::active("p1", 7);
        let json = serde_json::to_string(&p).unwrap();
        let back: Participant = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
        assert!(back.is_active());
    }
}
