//! Proptest generators for property-based testing.

use std::collections::HashMap;

use proptest::prelude::*;

use ring_relay::RosterEvent;
use ring_relay_core::{compute_order, Liveness, MessageId, Participant, ParticipantId, RingOrder};

/// Generate a participant identifier.
pub fn participant_id() -> impl Strategy<Value = ParticipantId> {
    "[a-z][a-z0-9]{0,7}".prop_map(ParticipantId::from)
}

/// Generate a random MessageId.
pub fn message_id() -> impl Strategy<Value = MessageId> {
    any::<[u8; 32]>().prop_map(MessageId::from_bytes)
}

pub fn liveness() -> impl Strategy<Value = Liveness> {
    prop_oneof![3 => Just(Liveness::Active), 1 => Just(Liveness::Inactive)]
}

/// Generate a participant. Join times collide often enough to exercise the
/// id tie-break.
pub fn participant() -> impl Strategy<Value = Participant> {
    (participant_id(), 0i64..50, liveness()).prop_map(|(id, joined_at, liveness)| Participant {
        id,
        joined_at,
        liveness,
    })
}

/// Generate a roster snapshot, possibly with repeated identifiers.
pub fn roster(max_len: usize) -> impl Strategy<Value = Vec<Participant>> {
    prop::collection::vec(participant(), 0..=max_len)
}

/// A flood to run on a ring of `p1..=p{size}`.
#[derive(Debug, Clone)]
pub struct RingParams {
    pub size: usize,
    /// Zero-based ring position of the origin.
    pub origin: usize,
    pub hops: u32,
}

impl Arbitrary for RingParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (1usize..=9)
            .prop_flat_map(|size| (Just(size), 0..size, 0u32..=10))
            .prop_map(|(size, origin, hops)| RingParams { size, origin, hops })
            .boxed()
    }
}

impl RingParams {
    /// Ring distance between two positions.
    pub fn distance(&self, a: usize, b: usize) -> usize {
        let forward = (b + self.size - a) % self.size;
        forward.min(self.size - forward)
    }

    /// Zero-based positions that must receive the flood exactly once.
    pub fn expected_receivers(&self) -> Vec<usize> {
        (0..self.size)
            .filter(|&i| {
                let d = self.distance(self.origin, i);
                d > 0 && d <= self.hops as usize
            })
            .collect()
    }
}

/// A roster notification as the session layer might send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterOp {
    /// A join carrying the snapshot the session layer held at the time.
    /// Inactive snapshot entries stand for departures.
    Join {
        index: usize,
        joined_at: i64,
        snapshot: Vec<(usize, i64, Liveness)>,
    },
    Leave { index: usize, at: i64 },
    Disconnect { index: usize },
    Reconnect { index: usize },
}

fn indexed(index: usize) -> ParticipantId {
    ParticipantId::new(format!("p{index}"))
}

impl RosterOp {
    pub fn id(&self) -> ParticipantId {
        let index = match self {
            RosterOp::Join { index, .. }
            | RosterOp::Leave { index, .. }
            | RosterOp::Disconnect { index }
            | RosterOp::Reconnect { index } => *index,
        };
        indexed(index)
    }

    /// The notification a roster source would send.
    pub fn to_event(&self) -> RosterEvent {
        match self {
            RosterOp::Join {
                joined_at,
                snapshot,
                ..
            } => RosterEvent::Joined {
                participant: Participant::active(self.id(), *joined_at),
                roster: snapshot
                    .iter()
                    .map(|&(index, joined_at, liveness)| Participant {
                        id: indexed(index),
                        joined_at,
                        liveness,
                    })
                    .collect(),
            },
            RosterOp::Leave { at, .. } => RosterEvent::Left {
                id: self.id(),
                at: Some(*at),
                roster: Vec::new(),
            },
            RosterOp::Disconnect { .. } => RosterEvent::Disconnected { id: self.id() },
            RosterOp::Reconnect { .. } => RosterEvent::Reconnected { id: self.id() },
        }
    }
}

/// Generate a roster history over `participants` identities, already
/// shuffled into an arbitrary delivery order.
pub fn roster_history(participants: usize, max_ops: usize) -> impl Strategy<Value = Vec<RosterOp>> {
    let entry = (0..participants, 0i64..100, liveness());
    let op = prop_oneof![
        4 => (0..participants, 0i64..100, prop::collection::vec(entry, 0..=3))
            .prop_map(|(index, joined_at, snapshot)| RosterOp::Join { index, joined_at, snapshot }),
        2 => (0..participants, 0i64..100).prop_map(|(index, at)| RosterOp::Leave { index, at }),
        1 => (0..participants).prop_map(|index| RosterOp::Disconnect { index }),
        1 => (0..participants).prop_map(|index| RosterOp::Reconnect { index }),
    ];
    prop::collection::vec(op, 1..=max_ops).prop_shuffle()
}

/// The ring a history converges to, whatever order it is delivered in.
///
/// A participant is in the ring when its latest join is newer than its
/// latest departure. Active snapshot entries count as joins and inactive
/// ones as departures at their join time. Disconnects and reconnects keep
/// the ring slot and do not change the order.
pub fn settled_order(history: &[RosterOp]) -> RingOrder {
    let mut joined: HashMap<ParticipantId, i64> = HashMap::new();
    let mut left: HashMap<ParticipantId, i64> = HashMap::new();
    let mut observe = |id: ParticipantId, at: i64, active: bool| {
        let latest = if active { &mut joined } else { &mut left };
        let latest = latest.entry(id).or_insert(at);
        *latest = (*latest).max(at);
    };
    for op in history {
        match op {
            RosterOp::Join {
                joined_at,
                snapshot,
                ..
            } => {
                observe(op.id(), *joined_at, true);
                for &(index, joined_at, liveness) in snapshot {
                    observe(indexed(index), joined_at, liveness == Liveness::Active);
                }
            }
            RosterOp::Leave { at, .. } => observe(op.id(), *at, false),
            RosterOp::Disconnect { .. } | RosterOp::Reconnect { .. } => {}
        }
    }

    let present: Vec<Participant> = joined
        .into_iter()
        .filter(|(id, joined_at)| left.get(id).map_or(true, |at| joined_at > at))
        .map(|(id, joined_at)| Participant::active(id, joined_at))
        .collect();
    compute_order(&present)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_expected_receivers_never_include_origin(params: RingParams) {
            prop_assert!(!params.expected_receivers().contains(&params.origin));
        }

        #[test]
        fn test_full_budget_reaches_everyone_else(size in 1usize..=9) {
            let params = RingParams { size, origin: 0, hops: size as u32 };
            prop_assert_eq!(params.expected_receivers().len(), size - 1);
        }

        #[test]
        fn test_settled_order_ignores_delivery_order(history in roster_history(4, 12)) {
            let mut reversed = history.clone();
            reversed.reverse();
            prop_assert_eq!(settled_order(&history), settled_order(&reversed));
        }
    }

    fn join(index: usize, joined_at: i64) -> RosterOp {
        RosterOp::Join {
            index,
            joined_at,
            snapshot: Vec::new(),
        }
    }

    #[test]
    fn test_leave_at_join_time_wins() {
        let history = vec![
            join(1, 5),
            RosterOp::Leave { index: 1, at: 5 },
            join(2, 3),
        ];
        assert_eq!(settled_order(&history).as_slice(), &[ParticipantId::from("p2")]);
    }

    #[test]
    fn test_inactive_snapshot_entry_departs() {
        let history = vec![
            join(1, 1),
            join(2, 2),
            RosterOp::Join {
                index: 3,
                joined_at: 3,
                snapshot: vec![(2, 2, Liveness::Inactive), (4, 4, Liveness::Active)],
            },
            RosterOp::Disconnect { index: 1 },
        ];
        let order = settled_order(&history);
        assert_eq!(order.as_slice(), &[indexed(1), indexed(3), indexed(4)]);
    }
}
