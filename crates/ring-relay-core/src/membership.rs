//! Membership ordering.
//!
//! Every node derives ring adjacency from the same deterministic total order
//! over active participants, so neighbor assignments agree without any
//! coordination between nodes.
//!
//! Order: `(joined_at, id)` ascending. The ring is circular, the last member
//! wraps around to the first.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{Direction, Participant, ParticipantId};

/// Ordered ring membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingOrder {
    members: Vec<ParticipantId>,
}

/// Neighbor pair of a ring member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbors {
    pub left: Option<ParticipantId>,
    pub right: Option<ParticipantId>,
}

impl Neighbors {
    /// The neighbor on the given side.
    pub fn get(&self, side: Direction) -> Option<&ParticipantId> {
        match side {
            Direction::Left => self.left.as_ref(),
            Direction::Right => self.right.as_ref(),
        }
    }
}

/// Compute the ring order for a set of participants.
///
/// Inactive participants are skipped. If the same identifier appears more
/// than once, only its earliest entry is kept.
pub fn compute_order(participants: &[Participant]) -> RingOrder {
    let mut active: Vec<&Participant> = participants.iter().filter(|p| p.is_active()).collect();
    active.sort_by(|a, b| (a.joined_at, &a.id).cmp(&(b.joined_at, &b.id)));

    let mut seen = HashSet::with_capacity(active.len());
    let members = active
        .into_iter()
        .filter(|p| seen.insert(&p.id))
        .map(|p| p.id.clone())
        .collect();

    RingOrder { members }
}

impl RingOrder {
    /// Build an order from an already sorted list of identifiers.
    pub fn from_members(members: Vec<ParticipantId>) -> Self {
        Self { members }
    }

    /// Number of members in the ring.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.position(id).is_some()
    }

    /// Index of a participant in the ring.
    pub fn position(&self, id: &ParticipantId) -> Option<usize> {
        self.members.iter().position(|m| m == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.members.iter()
    }

    pub fn as_slice(&self) -> &[ParticipantId] {
        &self.members
    }

    /// Neighbors of a participant.
    ///
    /// Returns `None` when the participant is not in the ring. In a ring of
    /// one, both neighbors are absent; in a ring of two, both are the other
    /// member.
    pub fn neighbors(&self, id: &ParticipantId) -> Option<Neighbors> {
        let i = self.position(id)?;
        let n = self.members.len();
        if n <= 1 {
            return Some(Neighbors::default());
        }
        Some(Neighbors {
            left: Some(self.members[(i + n - 1) % n].clone()),
            right: Some(self.members[(i + 1) % n].clone()),
        })
    }

    /// The member to the left of `id`.
    pub fn left_of(&self, id: &ParticipantId) -> Option<&ParticipantId> {
        self.step(id, Direction::Left)
    }

    /// The member to the right of `id`.
    pub fn right_of(&self, id: &ParticipantId) -> Option<&ParticipantId> {
        self.step(id, Direction::Right)
    }

    fn step(&self, id: &ParticipantId, direction: Direction) -> Option<&ParticipantId> {
        let n = self.members.len();
        if n <= 1 {
            return None;
        }
        let i = self.position(id)?;
        let j = match direction {
            Direction::Left => (i + n - 1) % n,
            Direction::Right => (i + 1) % n,
        };
        self.members.get(j)
    }
}
