//! Ring node state machine.
//!
//! `RingNode` holds everything a single participant needs to originate and
//! relay messages: its two neighbor pointers, the dedup cache, and the set
//! of neighbors it has locally observed as unreachable. It performs no I/O;
//! callers publish the envelopes it returns.
//!
//! # Relay rule
//!
//! A received envelope is delivered at most once per message id. It is
//! relayed one hop further in its direction of travel only while its TTL is
//! positive and the next neighbor is present and is not the origin.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use ring_relay_core::{
    now_millis, Direction, ForwardEnvelope, MessageId, Neighbors, ParticipantId, RingError,
    RingOrder, SeenCache,
};

use crate::config::NodeConfig;

/// Result of originating a message.
#[derive(Debug, Clone)]
pub struct Origination<P> {
    /// Identifier of the new message.
    pub message_id: MessageId,
    /// First-hop envelopes, one per present neighbor.
    pub envelopes: Vec<ForwardEnvelope<P>>,
}

/// Result of receiving an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reception<P> {
    /// The message was already delivered here. Nothing to do.
    Duplicate,
    /// First copy of this message.
    Delivered {
        /// Payload for the local handlers.
        payload: P,
        /// Next-hop envelope, if propagation continues.
        forward: Option<ForwardEnvelope<P>>,
    },
}

/// Neighbor coverage of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// Both neighbors present.
    Full,
    /// One neighbor absent: reduced fan-out until reconciled.
    Partial,
    /// No neighbors.
    Isolated,
}

/// Observability snapshot of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub participant_id: ParticipantId,
    pub has_left_neighbor: bool,
    pub has_right_neighbor: bool,
    pub seen_count: usize,
    pub needs_resync: bool,
    pub active: bool,
}

impl NodeStats {
    pub fn topology(&self) -> Topology {
        match (self.has_left_neighbor, self.has_right_neighbor) {
            (true, true) => Topology::Full,
            (false, false) => Topology::Isolated,
            _ => Topology::Partial,
        }
    }
}

/// Per-participant ring state.
#[derive(Debug)]
pub struct RingNode {
    self_id: ParticipantId,
    neighbors: Neighbors,
    seen: SeenCache,
    /// Neighbors reported unreachable and not yet reconciled.
    suppressed: HashSet<ParticipantId>,
    needs_resync: bool,
    active: bool,
    default_ttl: u32,
}

impl RingNode {
    /// Create a node with no neighbors yet.
    pub fn new(self_id: ParticipantId, config: &NodeConfig) -> Self {
        Self {
            self_id,
            neighbors: Neighbors::default(),
            seen: SeenCache::new(config.seen_capacity),
            suppressed: HashSet::new(),
            needs_resync: false,
            active: true,
            default_ttl: config.default_ttl,
        }
    }

    pub fn self_id(&self) -> &ParticipantId {
        &self.self_id
    }

    pub fn neighbors(&self) -> &Neighbors {
        &self.neighbors
    }

    /// The neighbor on the given side.
    pub fn neighbor(&self, side: Direction) -> Option<&ParticipantId> {
        self.neighbors.get(side)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    /// Whether a message has already been delivered or originated here.
    pub fn has_seen(&self, id: &MessageId) -> bool {
        self.seen.contains(id)
    }

    /// Assign neighbors from the ring order.
    ///
    /// A computed neighbor that was reported unreachable stays absent until
    /// the suppression is lifted or the neighbor leaves the ring.
    pub fn initialize(&mut self, order: &RingOrder) -> Result<&Neighbors, RingError> {
        let computed = order
            .neighbors(&self.self_id)
            .ok_or_else(|| RingError::NotInRing(self.self_id.clone()))?;

        self.suppressed.retain(|id| order.contains(id));
        let suppressed = &self.suppressed;
        let keep = |id: Option<ParticipantId>| id.filter(|id| !suppressed.contains(id));
        let neighbors = Neighbors {
            left: keep(computed.left),
            right: keep(computed.right),
        };

        self.neighbors = neighbors;
        self.needs_resync = !self.suppressed.is_empty();
        Ok(&self.neighbors)
    }

    /// Originate a message with the default hop budget.
    pub fn originate<P: Clone>(&mut self, payload: P) -> Result<Origination<P>, RingError> {
        self.originate_with_ttl(payload, self.default_ttl)
    }

    /// Originate a message that may travel at most `hops` hops.
    ///
    /// The first hop counts against the budget, so first-hop envelopes carry
    /// `hops - 1`. A budget of zero records the message without sending it.
    pub fn originate_with_ttl<P: Clone>(
        &mut self,
        payload: P,
        hops: u32,
    ) -> Result<Origination<P>, RingError> {
        if !self.active {
            return Err(RingError::NotActive(self.self_id.clone()));
        }

        let message_id = MessageId::random();
        self.seen.insert(message_id);

        let Some(ttl) = hops.checked_sub(1) else {
            return Ok(Origination {
                message_id,
                envelopes: Vec::new(),
            });
        };

        let created_at = now_millis();
        let envelopes = Direction::BOTH
            .iter()
            .filter_map(|&direction| {
                let target = self.neighbor(direction)?;
                Some(ForwardEnvelope {
                    message_id,
                    payload: payload.clone(),
                    origin_id: self.self_id.clone(),
                    ttl,
                    direction,
                    target_id: target.clone(),
                    created_at,
                })
            })
            .collect();

        Ok(Origination {
            message_id,
            envelopes,
        })
    }

    /// Process an inbound envelope.
    pub fn receive<P: Clone>(&mut self, envelope: ForwardEnvelope<P>) -> Reception<P> {
        if !self.seen.insert(envelope.message_id) {
            return Reception::Duplicate;
        }

        let forward = self
            .next_hop(&envelope)
            .and_then(|next| envelope.relay(next));

        Reception::Delivered {
            payload: envelope.payload,
            forward,
        }
    }

    fn next_hop<P>(&self, envelope: &ForwardEnvelope<P>) -> Option<ParticipantId> {
        if !self.active || envelope.ttl == 0 {
            return None;
        }
        let next = self.neighbor(envelope.direction)?;
        if *next == envelope.origin_id {
            return None;
        }
        Some(next.clone())
    }

    /// Drop the neighbor on `side` after a local delivery failure.
    ///
    /// Returns the neighbor that was dropped. This is a local view only; the
    /// coordinator decides the real topology.
    pub fn neighbor_unreachable(&mut self, side: Direction) -> Option<ParticipantId> {
        let slot = match side {
            Direction::Left => &mut self.neighbors.left,
            Direction::Right => &mut self.neighbors.right,
        };
        let dropped = slot.take();
        if let Some(id) = &dropped {
            self.suppressed.insert(id.clone());
        }
        self.needs_resync = true;
        dropped
    }

    /// Neighbors currently suppressed, sorted.
    pub fn suppressed(&self) -> Vec<ParticipantId> {
        let mut suppressed: Vec<ParticipantId> = self.suppressed.iter().cloned().collect();
        suppressed.sort();
        suppressed
    }

    /// Lift a suppression. Takes effect at the next `initialize`.
    pub fn neighbor_reachable(&mut self, id: &ParticipantId) -> bool {
        self.suppressed.remove(id)
    }

    /// Allow or forbid originating and relaying.
    ///
    /// Inactive nodes still deliver inbound messages locally.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            participant_id: self.self_id.clone(),
            has_left_neighbor: self.neighbors.left.is_some(),
            has_right_neighbor: self.neighbors.right.is_some(),
            seen_count: self.seen.len(),
            needs_resync: self.needs_resync,
            active: self.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    use proptest::prelude::*;
    use ring_relay_core::{compute_order, Participant};

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    fn order(n: usize) -> RingOrder {
        let participants: Vec<_> = (1..=n)
            .map(|i| Participant::active(format!("p{i}"), i as i64))
            .collect();
        compute_order(&participants)
    }

    fn ring(n: usize) -> HashMap<ParticipantId, RingNode> {
        let order = order(n);
        order
            .iter()
            .map(|id| {
                let mut node = RingNode::new(id.clone(), &NodeConfig::default());
                node.initialize(&order).unwrap();
                (id.clone(), node)
            })
            .collect()
    }

    /// Route envelopes until none are left.
    ///
    /// Checks every envelope against the hop budget and returns the number
    /// of deliveries per participant and the number of envelopes routed.
    fn flood(
        nodes: &mut HashMap<ParticipantId, RingNode>,
        initial: Vec<ForwardEnvelope<&'static str>>,
        hops: u32,
    ) -> (HashMap<ParticipantId, usize>, usize) {
        let n = nodes.len();
        let index = |id: &ParticipantId| id.as_str()[1..].parse::<usize>().unwrap() - 1;
        let mut queue: VecDeque<_> = initial.into();
        let mut deliveries = HashMap::new();
        let mut envelopes = 0;
        while let Some(env) = queue.pop_front() {
            envelopes += 1;
            let hop = (hops - env.ttl) as usize;
            let distance = match env.direction {
                Direction::Right => (index(&env.target_id) + n - index(&env.origin_id)) % n,
                Direction::Left => (index(&env.origin_id) + n - index(&env.target_id)) % n,
            };
            assert!(hop >= 1 && hop <= hops as usize, "hop bound exceeded");
            assert_eq!(distance, hop % n);
            let Some(node) = nodes.get_mut(&env.target_id) else {
                continue;
            };
            if let Reception::Delivered { forward, .. } = node.receive(env) {
                *deliveries.entry(node.self_id().clone()).or_insert(0) += 1;
                queue.extend(forward);
            }
        }
        (deliveries, envelopes)
    }

    #[test]
    fn test_initialize_not_in_ring() {
        let mut node = RingNode::new(pid("ghost"), &NodeConfig::default());
        let err = node.initialize(&order(3)).unwrap_err();
        assert_eq!(err, RingError::NotInRing(pid("ghost")));
    }

    #[test]
    fn test_initialize_sets_neighbors() {
        let mut node = RingNode::new(pid("p1"), &NodeConfig::default());
        let n = node.initialize(&order(3)).unwrap();
        assert_eq!(n.left, Some(pid("p3")));
        assert_eq!(n.right, Some(pid("p2")));
        assert_eq!(node.stats().topology(), Topology::Full);
    }

    #[test]
    fn test_single_member_is_isolated() {
        let mut node = RingNode::new(pid("p1"), &NodeConfig::default());
        node.initialize(&order(1)).unwrap();
        let origination = node.originate("hello").unwrap();
        assert!(origination.envelopes.is_empty());
        assert!(node.has_seen(&origination.message_id));
        assert_eq!(node.stats().topology(), Topology::Isolated);
    }

    #[test]
    fn test_originate_emits_both_directions() {
        let mut nodes = ring(4);
        let p1 = nodes.get_mut(&pid("p1")).unwrap();
        let origination = p1.originate("hello").unwrap();

        assert_eq!(origination.envelopes.len(), 2);
        let left = &origination.envelopes[0];
        let right = &origination.envelopes[1];
        assert_eq!((left.direction, &left.target_id), (Direction::Left, &pid("p4")));
        assert_eq!((right.direction, &right.target_id), (Direction::Right, &pid("p2")));
        assert!(origination.envelopes.iter().all(|e| e.ttl == crate::config::DEFAULT_TTL - 1));
        assert!(origination.envelopes.iter().all(|e| e.origin_id == pid("p1")));
    }

    #[test]
    fn test_zero_hop_budget_sends_nothing() {
        let mut nodes = ring(3);
        let origination = nodes
            .get_mut(&pid("p1"))
            .unwrap()
            .originate_with_ttl("quiet", 0)
            .unwrap();
        assert!(origination.envelopes.is_empty());
    }

    #[test]
    fn test_duplicate_is_absorbed() {
        let mut nodes = ring(3);
        let origination = nodes.get_mut(&pid("p1")).unwrap().originate("x").unwrap();
        let env = origination.envelopes[1].clone();
        let p2 = nodes.get_mut(&pid("p2")).unwrap();

        assert!(matches!(p2.receive(env.clone()), Reception::Delivered { .. }));
        assert_eq!(p2.receive(env), Reception::Duplicate);
        assert_eq!(p2.stats().seen_count, 1);
    }

    #[test]
    fn test_relay_stops_before_origin() {
        let mut nodes = ring(3);
        let origination = nodes.get_mut(&pid("p1")).unwrap().originate("x").unwrap();
        // Rightward: p1 -> p2 -> p3, and p3's right neighbor is the origin.
        let to_p2 = origination.envelopes[1].clone();
        let Reception::Delivered { forward, .. } = nodes.get_mut(&pid("p2")).unwrap().receive(to_p2)
        else {
            panic!("expected delivery");
        };
        let to_p3 = forward.unwrap();
        assert_eq!(to_p3.target_id, pid("p3"));

        let Reception::Delivered { forward, .. } = nodes.get_mut(&pid("p3")).unwrap().receive(to_p3)
        else {
            panic!("expected delivery");
        };
        assert!(forward.is_none());
    }

    #[test]
    fn test_ttl_zero_is_delivered_not_relayed() {
        let mut nodes = ring(5);
        let env = ForwardEnvelope {
            message_id: MessageId::from_bytes([1; 32]),
            payload: "last hop",
            origin_id: pid("p1"),
            ttl: 0,
            direction: Direction::Right,
            target_id: pid("p2"),
            created_at: 0,
        };
        let reception = nodes.get_mut(&pid("p2")).unwrap().receive(env);
        assert_eq!(
            reception,
            Reception::Delivered {
                payload: "last hop",
                forward: None
            }
        );
    }

    #[test]
    fn test_ttl_one_reaches_only_immediate_neighbors() {
        let mut nodes = ring(5);
        let origination = nodes
            .get_mut(&pid("p1"))
            .unwrap()
            .originate_with_ttl("m", 1)
            .unwrap();
        let (deliveries, _) = flood(&mut nodes, origination.envelopes, 1);

        let mut reached: Vec<_> = deliveries.keys().cloned().collect();
        reached.sort();
        assert_eq!(reached, vec![pid("p2"), pid("p5")]);
    }

    #[test]
    fn test_full_coverage_in_ring_of_four() {
        let mut nodes = ring(4);
        let origination = nodes
            .get_mut(&pid("p1"))
            .unwrap()
            .originate_with_ttl("m", 10)
            .unwrap();
        let (deliveries, envelopes) = flood(&mut nodes, origination.envelopes, 10);

        assert_eq!(deliveries.len(), 3);
        assert!(deliveries.values().all(|&n| n == 1));
        assert!(!deliveries.contains_key(&pid("p1")));
        assert!(envelopes <= 8);
    }

    #[test]
    fn test_unreachable_neighbor_is_suppressed_until_reconciled() {
        let order4 = order(4);
        let mut node = RingNode::new(pid("p1"), &NodeConfig::default());
        node.initialize(&order4).unwrap();

        assert_eq!(node.neighbor_unreachable(Direction::Right), Some(pid("p2")));
        assert!(node.needs_resync());
        assert_eq!(node.suppressed(), vec![pid("p2")]);
        assert_eq!(node.stats().topology(), Topology::Partial);

        // Re-initializing with the same order keeps the suppressed side empty.
        node.initialize(&order4).unwrap();
        assert_eq!(node.neighbor(Direction::Right), None);
        assert_eq!(node.neighbor(Direction::Left), Some(&pid("p4")));

        assert!(node.neighbor_reachable(&pid("p2")));
        node.initialize(&order4).unwrap();
        assert_eq!(node.neighbor(Direction::Right), Some(&pid("p2")));
        assert!(node.suppressed().is_empty());
        assert!(!node.needs_resync());
    }

    #[test]
    fn test_suppression_pruned_when_neighbor_leaves() {
        let mut node = RingNode::new(pid("p1"), &NodeConfig::default());
        node.initialize(&order(4)).unwrap();
        node.neighbor_unreachable(Direction::Right);

        let without_p2 = RingOrder::from_members(vec![pid("p1"), pid("p3"), pid("p4")]);
        node.initialize(&without_p2).unwrap();
        assert_eq!(node.neighbor(Direction::Right), Some(&pid("p3")));
        assert!(!node.needs_resync());
    }

    #[test]
    fn test_inactive_node_delivers_but_does_not_relay() {
        let mut nodes = ring(4);
        let origination = nodes.get_mut(&pid("p1")).unwrap().originate("x").unwrap();
        let p2 = nodes.get_mut(&pid("p2")).unwrap();
        p2.set_active(false);

        let reception = p2.receive(origination.envelopes[1].clone());
        assert!(matches!(reception, Reception::Delivered { forward: None, .. }));
        assert_eq!(
            p2.originate("nope").unwrap_err(),
            RingError::NotActive(pid("p2"))
        );
    }

    proptest! {
        #[test]
        fn prop_hop_bound_and_exactly_once(n in 1usize..12, hops in 0u32..14, origin in 0usize..12) {
            let mut nodes = ring(n);
            let origin = pid(&format!("p{}", origin % n + 1));
            let origination = nodes
                .get_mut(&origin)
                .unwrap()
                .originate_with_ttl("m", hops)
                .unwrap();
            let (deliveries, _) = flood(&mut nodes, origination.envelopes, hops);

            prop_assert!(deliveries.values().all(|&c| c == 1));
            prop_assert!(!deliveries.contains_key(&origin));
            if hops as usize >= n {
                prop_assert_eq!(deliveries.len(), n - 1);
            }
            // Each direction reaches at most `hops` distinct participants.
            prop_assert!(deliveries.len() <= 2 * hops as usize);
        }
    }
}
