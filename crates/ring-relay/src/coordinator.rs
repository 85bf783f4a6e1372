//! The ring coordinator.
//!
//! The coordinator owns one node per active participant and keeps their
//! neighbor assignments in step with the roster. Every topology change
//! recomputes the order and reinitializes every node, which is linear in
//! the ring size; that is fine for rooms of tens to low hundreds of
//! participants.
//!
//! Participant lifecycle:
//!
//! ```text
//! absent -> active -> unreachable -> active   (reconnect)
//!                                 -> absent   (grace expired or explicit leave)
//! ```
//!
//! Roster notifications may arrive twice or out of order. A departure leaves
//! a tombstone with its time; any later join for that participant whose
//! `joined_at` is not newer than the tombstone is stale and ignored. An
//! inactive snapshot entry is a departure stamped with its own `joined_at`.
//!
//! Every rebuild also repairs the nodes themselves: a node whose task has
//! stopped is restarted, and a participant whose node cannot be started is
//! left out of the order until a later rebuild manages to start it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;

use ring_relay_core::{
    compute_order, now_millis, Direction, MessageId, Neighbors, Participant, ParticipantId,
    Payload, RingError, RingOrder,
};
use ring_relay_node::{spawn_node, NodeError, NodeHandle, NodeStats};
use ring_relay_transport::Transport;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::roster::RosterEvent;

/// Coordinator view of a ring member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    Active,
    /// Reported disconnected; neighbors route around it until it reconnects
    /// or its grace period runs out.
    Unreachable,
}

/// Maintains ring membership and the nodes that realize it.
pub struct RingCoordinator<P, T> {
    transport: Arc<T>,
    config: RelayConfig,
    nodes: HashMap<ParticipantId, NodeHandle<P>>,
    order: Arc<RingOrder>,
    /// Latest known entry per participant, merged from roster snapshots.
    roster: HashMap<ParticipantId, Participant>,
    /// Departure time (Unix ms) per participant.
    departed: HashMap<ParticipantId, i64>,
    /// Reconciliation deadline per unreachable participant.
    unreachable: HashMap<ParticipantId, Instant>,
}

impl<P, T> RingCoordinator<P, T>
where
    P: Payload,
    T: Transport<P>,
{
    /// Create a coordinator with an empty ring.
    pub fn new(transport: Arc<T>, config: RelayConfig) -> Self {
        Self {
            transport,
            config,
            nodes: HashMap::new(),
            order: Arc::new(RingOrder::default()),
            roster: HashMap::new(),
            departed: HashMap::new(),
            unreachable: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Roster Events
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a roster event.
    pub async fn apply(&mut self, event: RosterEvent) -> Result<()> {
        match event {
            RosterEvent::Joined {
                participant,
                roster,
            } => self.on_participant_joined(participant, &roster).await,
            RosterEvent::Left { id, at, roster } => {
                let at = at.unwrap_or_else(now_millis);
                self.on_participant_left_at(&id, at, &roster).await
            }
            RosterEvent::Disconnected { id } => self.on_participant_disconnect_detected(&id).await,
            RosterEvent::Reconnected { id } => self.on_participant_reconnected(&id).await,
        }
    }

    /// A participant joined the session.
    ///
    /// `roster` is the session layer's snapshot at the time of the join.
    pub async fn on_participant_joined(
        &mut self,
        participant: Participant,
        roster: &[Participant],
    ) -> Result<()> {
        self.merge_roster(roster);
        if !self.admit(participant.clone()) {
            tracing::debug!(participant = %participant.id, joined_at = participant.joined_at, "stale join ignored");
        }
        self.rebuild().await
    }

    /// A participant left the session now.
    pub async fn on_participant_left(
        &mut self,
        id: &ParticipantId,
        roster: &[Participant],
    ) -> Result<()> {
        self.on_participant_left_at(id, now_millis(), roster).await
    }

    /// A participant left the session at `at` (Unix ms).
    pub async fn on_participant_left_at(
        &mut self,
        id: &ParticipantId,
        at: i64,
        roster: &[Participant],
    ) -> Result<()> {
        self.record_departure(id, at);
        self.merge_roster(roster);
        self.rebuild().await
    }

    /// The session layer lost contact with a participant.
    ///
    /// The participant keeps its ring slot for the configured grace period.
    /// Its node stops originating and relaying, and both neighbors route
    /// around it. Repeated reports keep the first deadline.
    pub async fn on_participant_disconnect_detected(&mut self, id: &ParticipantId) -> Result<()> {
        let Some(handle) = self.nodes.get(id) else {
            tracing::debug!(participant = %id, "disconnect for participant outside the ring");
            return Ok(());
        };
        if self.unreachable.contains_key(id) {
            return Ok(());
        }

        tolerate_closed(handle.set_active(false).await)?;
        let deadline = Instant::now() + self.config.disconnect_grace;
        self.unreachable.insert(id.clone(), deadline);
        self.isolate(id).await?;

        tracing::info!(
            participant = %id,
            grace = ?self.config.disconnect_grace,
            "participant unreachable"
        );
        Ok(())
    }

    /// A previously unreachable participant is back.
    pub async fn on_participant_reconnected(&mut self, id: &ParticipantId) -> Result<()> {
        if self.unreachable.remove(id).is_none() {
            return Ok(());
        }
        if let Some(handle) = self.nodes.get(id) {
            tolerate_closed(handle.set_active(true).await)?;
        }

        tracing::info!(participant = %id, "participant reconnected");
        self.reinitialize().await
    }

    /// Evict every unreachable participant whose grace period has passed.
    ///
    /// Returns the evicted participants.
    pub async fn reconcile_expired(&mut self) -> Result<Vec<ParticipantId>> {
        let now = Instant::now();
        let mut expired: Vec<ParticipantId> = self
            .unreachable
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        if expired.is_empty() {
            return Ok(expired);
        }
        expired.sort();

        let at = now_millis();
        for id in &expired {
            tracing::info!(participant = %id, "grace period expired, removing participant");
            self.record_departure(id, at);
            self.unreachable.remove(id);
        }
        self.rebuild().await?;
        Ok(expired)
    }

    /// Earliest pending reconciliation deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.unreachable.values().min().copied()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Messaging
    // ─────────────────────────────────────────────────────────────────────────

    /// Originate a message from `id` with the configured hop budget.
    pub async fn originate(&self, id: &ParticipantId, payload: P) -> Result<MessageId> {
        let handle = self.reachable_node(id)?;
        Ok(handle.originate(payload).await?)
    }

    /// Originate a message from `id` that travels at most `hops` hops.
    pub async fn originate_with_ttl(
        &self,
        id: &ParticipantId,
        payload: P,
        hops: u32,
    ) -> Result<MessageId> {
        let handle = self.reachable_node(id)?;
        Ok(handle.originate_with_ttl(payload, hops).await?)
    }

    /// Register a delivery handler on the node of `id`.
    ///
    /// The handler lives as long as the node; a participant that leaves and
    /// rejoins gets a fresh node without it.
    pub async fn register_handler<F>(&self, id: &ParticipantId, handler: F) -> Result<()>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let handle = self
            .nodes
            .get(id)
            .ok_or_else(|| RingError::NotInRing(id.clone()))?;
        Ok(handle.register_handler(handler).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Current ring order.
    pub fn membership(&self) -> &RingOrder {
        &self.order
    }

    pub fn member_state(&self, id: &ParticipantId) -> Option<MemberState> {
        if !self.nodes.contains_key(id) {
            None
        } else if self.unreachable.contains_key(id) {
            Some(MemberState::Unreachable)
        } else {
            Some(MemberState::Active)
        }
    }

    /// Handle to the node of `id`.
    pub fn node(&self, id: &ParticipantId) -> Option<&NodeHandle<P>> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Neighbors the node of `id` currently relays to.
    pub async fn neighbors(&self, id: &ParticipantId) -> Result<Neighbors> {
        let handle = self
            .nodes
            .get(id)
            .ok_or_else(|| RingError::NotInRing(id.clone()))?;
        Ok(handle.neighbors().await?)
    }

    /// Stats of every node, in ring order.
    pub async fn stats(&self) -> Result<Vec<NodeStats>> {
        let mut stats = Vec::with_capacity(self.order.len());
        for id in self.order.iter() {
            if let Some(handle) = self.nodes.get(id) {
                stats.push(handle.stats().await?);
            }
        }
        Ok(stats)
    }

    /// Stop every node.
    pub async fn shutdown(&mut self) {
        for (id, handle) in self.nodes.drain() {
            if let Err(e) = handle.shutdown().await {
                tracing::debug!(participant = %id, error = %e, "node already stopped");
            }
        }
        self.unreachable.clear();
        self.order = Arc::new(RingOrder::default());
        tracing::info!("ring coordinator stopped");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    fn reachable_node(&self, id: &ParticipantId) -> Result<&NodeHandle<P>> {
        if self.unreachable.contains_key(id) {
            return Err(RelayError::Unreachable(id.clone()));
        }
        self.nodes
            .get(id)
            .ok_or_else(|| RingError::NotInRing(id.clone()).into())
    }

    /// Accept a roster entry unless a departure or a later join supersedes it.
    fn admit(&mut self, participant: Participant) -> bool {
        if !participant.is_active() {
            self.record_departure(&participant.id, participant.joined_at);
            return false;
        }
        let superseded = self
            .departed
            .get(&participant.id)
            .is_some_and(|&left_at| participant.joined_at <= left_at);
        let outdated = self
            .roster
            .get(&participant.id)
            .is_some_and(|known| known.joined_at > participant.joined_at);
        if superseded || outdated {
            return false;
        }
        self.roster.insert(participant.id.clone(), participant);
        true
    }

    fn merge_roster(&mut self, roster: &[Participant]) {
        for participant in roster {
            self.admit(participant.clone());
        }
    }

    fn record_departure(&mut self, id: &ParticipantId, at: i64) {
        let left_at = self.departed.entry(id.clone()).or_insert(at);
        *left_at = (*left_at).max(at);
        let left_at = *left_at;

        // A rejoin already seen with a newer join time survives.
        if self.roster.get(id).is_some_and(|entry| entry.joined_at <= left_at) {
            self.roster.remove(id);
        }
    }

    /// Recompute the order and bring the node set and every node's
    /// neighbors in line with it.
    async fn rebuild(&mut self) -> Result<()> {
        let participants: Vec<Participant> = self.roster.values().cloned().collect();
        let wanted = compute_order(&participants);

        let stale: Vec<ParticipantId> = self
            .nodes
            .iter()
            .filter(|(id, handle)| !wanted.contains(id) || handle.is_closed())
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            let Some(handle) = self.nodes.remove(&id) else {
                continue;
            };
            if !wanted.contains(&id) {
                self.unreachable.remove(&id);
                if let Err(e) = handle.shutdown().await {
                    tracing::debug!(participant = %id, error = %e, "node already stopped");
                }
            } else {
                tracing::warn!(participant = %id, "ring node stopped unexpectedly, restarting");
            }
        }

        for id in wanted.iter() {
            if self.nodes.contains_key(id) {
                continue;
            }
            let spawned =
                spawn_node::<P, T>(id.clone(), Arc::clone(&self.transport), self.config.node.clone())
                    .await;
            match spawned {
                Ok(handle) => {
                    if self.unreachable.contains_key(id) {
                        tolerate_closed(handle.set_active(false).await)?;
                    }
                    self.nodes.insert(id.clone(), handle);
                }
                Err(e) => {
                    tracing::warn!(participant = %id, error = %e, "failed to start ring node, leaving it out of the ring");
                }
            }
        }

        // Only participants with a running node are handed out as neighbors.
        let order = if wanted.iter().all(|id| self.nodes.contains_key(id)) {
            wanted
        } else {
            let live = wanted
                .iter()
                .filter(|id| self.nodes.contains_key(*id))
                .cloned()
                .collect();
            RingOrder::from_members(live)
        };

        let order = Arc::new(order);
        if order != self.order {
            tracing::info!(
                members = order.len(),
                nodes = self.nodes.len(),
                "ring topology changed"
            );
        }
        self.order = order;
        self.reinitialize().await
    }

    /// Push the current order to every node, then re-apply the detours
    /// around unreachable participants.
    ///
    /// The coordinator's view is authoritative: a suppression a node holds
    /// for a participant that is not unreachable here is lifted first.
    async fn reinitialize(&self) -> Result<()> {
        for handle in self.nodes.values() {
            tolerate_closed(self.reinitialize_node(handle).await)?;
        }

        let mut unreachable: Vec<&ParticipantId> = self.unreachable.keys().collect();
        unreachable.sort();
        for id in unreachable {
            self.isolate(id).await?;
        }
        Ok(())
    }

    async fn reinitialize_node(&self, handle: &NodeHandle<P>) -> ring_relay_node::Result<()> {
        for id in handle.suppressed().await? {
            if !self.unreachable.contains_key(&id) {
                handle.neighbor_reachable(id).await?;
            }
        }
        handle.initialize(Arc::clone(&self.order)).await?;
        Ok(())
    }

    /// Have both ring neighbors of `id` drop it.
    async fn isolate(&self, id: &ParticipantId) -> Result<()> {
        if let Some(handle) = self.order.left_of(id).and_then(|left| self.nodes.get(left)) {
            tolerate_closed(handle.neighbor_unreachable(Direction::Right).await)?;
        }
        if let Some(handle) = self.order.right_of(id).and_then(|right| self.nodes.get(right)) {
            tolerate_closed(handle.neighbor_unreachable(Direction::Left).await)?;
        }
        Ok(())
    }
}

/// A stopped node only costs fan-out until the next rebuild restarts it.
fn tolerate_closed(result: ring_relay_node::Result<()>) -> Result<()> {
    match result {
        Err(NodeError::Closed(id)) => {
            tracing::warn!(participant = %id, "ring node stopped, skipping it");
            Ok(())
        }
        other => Ok(other?),
    }
}
