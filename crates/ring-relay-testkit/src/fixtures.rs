//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Everything here runs on the
//! in-memory network with `String` payloads.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use ring_relay::{RelayConfig, Result, RingCoordinator};
use ring_relay_core::{MessageId, Participant, ParticipantId};
use ring_relay_transport::MemoryNetwork;

use crate::recorder::Recorder;

/// Long enough for any in-flight flood on the in-memory network to finish.
///
/// Tests run with a paused clock, so waiting this long costs nothing.
pub const SETTLE: Duration = Duration::from_millis(100);

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Active participant `p{index}` that joined at `index`.
pub fn participant(index: usize) -> Participant {
    Participant::active(format!("p{index}"), index as i64)
}

/// Participants `p1..=pn` in join order.
pub fn roster(n: usize) -> Vec<Participant> {
    (1..=n).map(participant).collect()
}

/// Participants `p1..=pn` in a seeded random order, as a session layer
/// might report them.
pub fn shuffled_roster(n: usize, seed: u64) -> Vec<Participant> {
    let mut participants = roster(n);
    participants.shuffle(&mut StdRng::seed_from_u64(seed));
    participants
}

/// Let in-flight forwards drain.
pub async fn settle() {
    tokio::time::sleep(SETTLE).await;
}

pub type TestCoordinator = RingCoordinator<String, MemoryNetwork<String>>;

/// A coordinator over an in-memory network, with every node recording into
/// one shared [`Recorder`].
pub struct TestRing {
    pub network: Arc<MemoryNetwork<String>>,
    pub coordinator: TestCoordinator,
    pub recorder: Recorder<String>,
    roster: Vec<Participant>,
    listening: HashSet<ParticipantId>,
}

impl TestRing {
    /// A ring of `p1..=pn` with default configuration.
    pub async fn new(size: usize) -> Result<Self> {
        Self::with_config(size, RelayConfig::default()).await
    }

    pub async fn with_config(size: usize, config: RelayConfig) -> Result<Self> {
        let network = MemoryNetwork::new();
        let mut ring = Self {
            coordinator: RingCoordinator::new(Arc::clone(&network), config),
            network,
            recorder: Recorder::new(),
            roster: Vec::new(),
            listening: HashSet::new(),
        };
        for p in roster(size) {
            ring.join(p).await?;
        }
        Ok(ring)
    }

    /// Announce a join, carrying the accumulated roster as the snapshot.
    pub async fn join(&mut self, participant: Participant) -> Result<()> {
        self.roster.retain(|p| p.id != participant.id);
        self.roster.push(participant.clone());
        self.coordinator
            .on_participant_joined(participant, &self.roster)
            .await?;
        self.listen().await
    }

    /// Announce a departure at `at` (Unix ms).
    pub async fn leave_at(&mut self, id: &str, at: i64) -> Result<()> {
        let id = ParticipantId::from(id);
        self.roster.retain(|p| p.id != id);
        self.coordinator
            .on_participant_left_at(&id, at, &self.roster)
            .await?;
        self.listen().await
    }

    pub async fn disconnect(&mut self, id: &str) -> Result<()> {
        self.coordinator
            .on_participant_disconnect_detected(&id.into())
            .await
    }

    pub async fn reconnect(&mut self, id: &str) -> Result<()> {
        self.coordinator.on_participant_reconnected(&id.into()).await
    }

    /// Evict participants whose disconnect grace has run out.
    pub async fn reconcile_expired(&mut self) -> Result<Vec<ParticipantId>> {
        let expired = self.coordinator.reconcile_expired().await?;
        self.roster.retain(|p| !expired.contains(&p.id));
        self.listen().await?;
        Ok(expired)
    }

    pub async fn originate(&self, id: &str, payload: &str) -> Result<MessageId> {
        self.coordinator
            .originate(&id.into(), payload.to_string())
            .await
    }

    pub async fn originate_with_ttl(&self, id: &str, payload: &str, hops: u32) -> Result<MessageId> {
        self.coordinator
            .originate_with_ttl(&id.into(), payload.to_string(), hops)
            .await
    }

    /// Current ring order as plain strings.
    pub fn order(&self) -> Vec<String> {
        self.coordinator
            .membership()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }

    pub async fn shutdown(mut self) {
        self.coordinator.shutdown().await;
    }

    /// Hook the recorder onto nodes created since the last call.
    async fn listen(&mut self) -> Result<()> {
        let members: Vec<ParticipantId> = self.coordinator.membership().iter().cloned().collect();
        self.listening.retain(|id| members.contains(id));
        for id in members {
            if self.listening.contains(&id) {
                continue;
            }
            self.coordinator
                .register_handler(&id, self.recorder.handler(id.clone()))
                .await?;
            self.listening.insert(id);
        }
        Ok(())
    }
}
