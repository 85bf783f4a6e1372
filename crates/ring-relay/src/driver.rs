//! Event loop feeding roster events into a coordinator.

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use ring_relay_core::Payload;
use ring_relay_transport::Transport;

use crate::coordinator::RingCoordinator;
use crate::roster::RosterEvent;

/// Drive `coordinator` from a roster event channel.
///
/// Events are applied in arrival order. Between events the loop wakes at
/// the earliest disconnect deadline and evicts expired participants. A
/// failed event is logged and skipped. Returns the coordinator once every
/// sender is gone, with its nodes still running.
pub async fn run_coordinator<P, T>(
    mut coordinator: RingCoordinator<P, T>,
    mut events: mpsc::Receiver<RosterEvent>,
) -> RingCoordinator<P, T>
where
    P: Payload,
    T: Transport<P>,
{
    loop {
        let deadline = coordinator.next_deadline();

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let participant = event.participant_id().clone();
                    if let Err(e) = coordinator.apply(event).await {
                        tracing::warn!(participant = %participant, error = %e, "roster event failed");
                    }
                }
                None => break,
            },

            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Err(e) = coordinator.reconcile_expired().await {
                    tracing::warn!(error = %e, "reconciliation failed");
                }
            }
        }
    }

    tracing::debug!("roster channel closed");
    coordinator
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use ring_relay_core::{Participant, ParticipantId};
    use ring_relay_transport::MemoryNetwork;

    use crate::config::RelayConfig;
    use crate::coordinator::MemberState;

    #[tokio::test(start_paused = true)]
    async fn test_driver_evicts_after_grace() {
        let network = MemoryNetwork::<String>::new();
        let config = RelayConfig::default().with_disconnect_grace(Duration::from_secs(3));
        let coordinator = RingCoordinator::<String, _>::new(Arc::clone(&network), config);

        let (tx, rx) = mpsc::channel(16);
        let driver = tokio::spawn(run_coordinator(coordinator, rx));

        let roster: Vec<_> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, id)| Participant::active(*id, i as i64))
            .collect();
        for participant in &roster {
            tx.send(RosterEvent::Joined {
                participant: participant.clone(),
                roster: roster.clone(),
            })
            .await
            .unwrap();
        }
        tx.send(RosterEvent::Disconnected { id: "b".into() })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(tx);
        let mut coordinator = driver.await.unwrap();

        assert!(!coordinator.membership().contains(&ParticipantId::from("b")));
        assert_eq!(coordinator.member_state(&"a".into()), Some(MemberState::Active));
        assert!(!network.is_subscribed(&"b".into()).await);
        coordinator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_within_grace_keeps_slot() {
        let network = MemoryNetwork::<String>::new();
        let config = RelayConfig::default().with_disconnect_grace(Duration::from_secs(3));
        let coordinator = RingCoordinator::<String, _>::new(Arc::clone(&network), config);

        let (tx, rx) = mpsc::channel(16);
        let driver = tokio::spawn(run_coordinator(coordinator, rx));

        let roster = vec![Participant::active("a", 1), Participant::active("b", 2)];
        tx.send(RosterEvent::Joined {
            participant: roster[1].clone(),
            roster: roster.clone(),
        })
        .await
        .unwrap();
        tx.send(RosterEvent::Disconnected { id: "b".into() })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(RosterEvent::Reconnected { id: "b".into() })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        drop(tx);
        let coordinator = driver.await.unwrap();
        assert_eq!(coordinator.member_state(&"b".into()), Some(MemberState::Active));
        assert_eq!(coordinator.membership().len(), 2);
    }
}
