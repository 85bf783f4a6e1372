//! Roster notifications consumed by the coordinator.

use serde::{Deserialize, Serialize};

use ring_relay_core::{Participant, ParticipantId};

/// A change reported by the session layer.
///
/// Join and leave events carry the roster snapshot the session layer had
/// when it emitted them. Snapshots may be stale; the coordinator merges
/// them rather than replacing its view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RosterEvent {
    Joined {
        participant: Participant,
        #[serde(default)]
        roster: Vec<Participant>,
    },
    Left {
        id: ParticipantId,
        /// Departure time (Unix ms). Defaults to the time of handling.
        #[serde(default)]
        at: Option<i64>,
        #[serde(default)]
        roster: Vec<Participant>,
    },
    Disconnected {
        id: ParticipantId,
    },
    Reconnected {
        id: ParticipantId,
    },
}

impl RosterEvent {
    /// The participant the event is about.
    pub fn participant_id(&self) -> &ParticipantId {
        match self {
            RosterEvent::Joined { participant, .. } => &participant.id,
            RosterEvent::Left { id, .. }
            | RosterEvent::Disconnected { id }
            | RosterEvent::Reconnected { id } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_json() {
        let event: RosterEvent = serde_json::from_str(
            r#"{"event":"joined","participant":{"id":"p1","joined_at":5,"liveness":"Active"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            RosterEvent::Joined {
                participant: Participant::active("p1", 5),
                roster: vec![],
            }
        );
        assert_eq!(event.participant_id().as_str(), "p1");
    }

    #[test]
    fn test_left_without_time() {
        let event: RosterEvent = serde_json::from_str(r#"{"event":"left","id":"p2"}"#).unwrap();
        assert!(matches!(event, RosterEvent::Left { at: None, .. }));
    }
}
