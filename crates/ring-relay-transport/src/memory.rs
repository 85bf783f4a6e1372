//! A simple in-memory transport for testing.
//!
//! Uses one bounded channel per subscribed participant. A full inbox pushes
//! back on the publisher for at most `send_timeout`.
//!
//! Failure injection:
//! - [`MemoryNetwork::set_unavailable`] makes every publish fail
//! - [`MemoryNetwork::set_duplicate_delivery`] delivers every envelope twice
//! - [`MemoryNetwork::set_subscribe_unavailable`] makes every subscribe fail

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};

use ring_relay_core::{ForwardEnvelope, ParticipantId, Payload};

use crate::error::{Result, TransportError};
use crate::transport::{Subscription, Transport};

/// Configuration for [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemoryNetworkConfig {
    /// Capacity of each participant's inbox.
    pub inbox_capacity: usize,
    /// How long a publish waits on a full inbox.
    pub send_timeout: Duration,
    /// How many delivered envelopes the publish log retains. Older entries
    /// are dropped first; zero disables the log.
    pub log_capacity: usize,
}

impl Default for MemoryNetworkConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 256,
            send_timeout: Duration::from_millis(500),
            log_capacity: 1024,
        }
    }
}

/// Shared in-memory network.
pub struct MemoryNetwork<P> {
    config: MemoryNetworkConfig,
    /// Inbox senders for each subscribed participant.
    inboxes: RwLock<HashMap<ParticipantId, mpsc::Sender<ForwardEnvelope<P>>>>,
    /// Most recent envelopes handed to an inbox, in publish order.
    log: Mutex<VecDeque<ForwardEnvelope<P>>>,
    unavailable: AtomicBool,
    subscribe_unavailable: AtomicBool,
    duplicate: AtomicBool,
    publish_attempts: AtomicUsize,
    delivered: AtomicUsize,
}

impl<P: Payload> MemoryNetwork<P> {
    /// Create a new memory network.
    pub fn new() -> Arc<Self> {
        Self::with_config(MemoryNetworkConfig::default())
    }

    pub fn with_config(config: MemoryNetworkConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            inboxes: RwLock::new(HashMap::new()),
            log: Mutex::new(VecDeque::new()),
            unavailable: AtomicBool::new(false),
            subscribe_unavailable: AtomicBool::new(false),
            duplicate: AtomicBool::new(false),
            publish_attempts: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
        })
    }

    /// Make every publish fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every subscribe fail with `Unavailable` until reset.
    pub fn set_subscribe_unavailable(&self, unavailable: bool) {
        self.subscribe_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Deliver every envelope twice.
    pub fn set_duplicate_delivery(&self, duplicate: bool) {
        self.duplicate.store(duplicate, Ordering::SeqCst);
    }

    /// The most recent envelopes delivered to an inbox, up to
    /// `log_capacity` of them.
    pub async fn published(&self) -> Vec<ForwardEnvelope<P>> {
        self.log.lock().await.iter().cloned().collect()
    }

    /// Number of envelopes delivered to an inbox so far, including those
    /// no longer retained in the log.
    pub async fn published_count(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Number of publish calls, including failed ones.
    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    pub async fn is_subscribed(&self, participant: &ParticipantId) -> bool {
        self.inboxes.read().await.contains_key(participant)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inboxes.read().await.len()
    }
}

#[async_trait]
impl<P: Payload> Transport<P> for MemoryNetwork<P> {
    async fn publish(&self, envelope: ForwardEnvelope<P>) -> Result<()> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("memory network offline".into()));
        }

        let sender = match self.inboxes.read().await.get(&envelope.target_id) {
            Some(sender) => sender.clone(),
            None => {
                tracing::trace!(participant = %envelope.target_id, "no subscriber, dropping envelope");
                return Ok(());
            }
        };

        let copy = self
            .duplicate
            .load(Ordering::SeqCst)
            .then(|| envelope.clone());
        let logged = (self.config.log_capacity > 0).then(|| envelope.clone());

        match sender.send_timeout(envelope, self.config.send_timeout).await {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::SeqCst);
                if let Some(logged) = logged {
                    let mut log = self.log.lock().await;
                    if log.len() == self.config.log_capacity {
                        log.pop_front();
                    }
                    log.push_back(logged);
                }
            }
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                return Err(TransportError::Timeout(self.config.send_timeout));
            }
            // Receiver went away between lookup and send: participant left.
            Err(mpsc::error::SendTimeoutError::Closed(_)) => return Ok(()),
        }

        if let Some(copy) = copy {
            // Redelivery is best-effort.
            let _ = sender.try_send(copy);
        }
        Ok(())
    }

    async fn subscribe(&self, participant: &ParticipantId) -> Result<Subscription<P>> {
        if self.subscribe_unavailable.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("memory network refusing subscribers".into()));
        }
        let (tx, rx) = mpsc::channel(self.config.inbox_capacity.max(1));
        self.inboxes.write().await.insert(participant.clone(), tx);
        Ok(Subscription::new(participant.clone(), rx))
    }

    async fn unsubscribe(&self, participant: &ParticipantId) -> Result<()> {
        self.inboxes.write().await.remove(participant);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring_relay_core::{Direction, MessageId};

    fn envelope(target: &str) -> ForwardEnvelope<String> {
        ForwardEnvelope {
            message_id: MessageId::from_bytes([7; 32]),
            payload: "hi".into(),
            origin_id: ParticipantId::from("p1"),
            ttl: 3,
            direction: Direction::Right,
            target_id: ParticipantId::from(target),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_memory_network_addressed_delivery() {
        let network = MemoryNetwork::<String>::new();
        let mut p2 = network.subscribe(&"p2".into()).await.unwrap();
        let mut p3 = network.subscribe(&"p3".into()).await.unwrap();

        network.publish(envelope("p2")).await.unwrap();

        let received = p2.recv().await.unwrap();
        assert_eq!(received.target_id, ParticipantId::from("p2"));
        assert!(p3.try_recv().is_none());
        assert_eq!(network.published_count().await, 1);
    }

    #[tokio::test]
    async fn test_publish_to_departed_participant_is_dropped() {
        let network = MemoryNetwork::<String>::new();
        let _p2 = network.subscribe(&"p2".into()).await.unwrap();
        network.unsubscribe(&"p2".into()).await.unwrap();

        assert!(network.publish(envelope("p2")).await.is_ok());
        assert_eq!(network.published_count().await, 0);
        assert!(!network.is_subscribed(&"p2".into()).await);
    }

    #[tokio::test]
    async fn test_unavailable_network_fails_publish() {
        let network = MemoryNetwork::<String>::new();
        let _p2 = network.subscribe(&"p2".into()).await.unwrap();
        network.set_unavailable(true);

        let err = network.publish(envelope("p2")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(network.publish_attempts(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_delivery() {
        let network = MemoryNetwork::<String>::new();
        let mut p2 = network.subscribe(&"p2".into()).await.unwrap();
        network.set_duplicate_delivery(true);

        network.publish(envelope("p2")).await.unwrap();

        let first = p2.recv().await.unwrap();
        let second = p2.recv().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_inbox_times_out() {
        let network = MemoryNetwork::<String>::with_config(MemoryNetworkConfig {
            inbox_capacity: 1,
            send_timeout: Duration::from_millis(10),
            ..MemoryNetworkConfig::default()
        });
        let _p2 = network.subscribe(&"p2".into()).await.unwrap();

        network.publish(envelope("p2")).await.unwrap();
        let err = network.publish(envelope("p2")).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_publish_log_keeps_most_recent() {
        let network = MemoryNetwork::<String>::with_config(MemoryNetworkConfig {
            log_capacity: 2,
            ..MemoryNetworkConfig::default()
        });
        let _p2 = network.subscribe(&"p2".into()).await.unwrap();
        let _p3 = network.subscribe(&"p3".into()).await.unwrap();

        network.publish(envelope("p2")).await.unwrap();
        network.publish(envelope("p3")).await.unwrap();
        network.publish(envelope("p2")).await.unwrap();

        let log = network.published().await;
        let targets: Vec<&str> = log.iter().map(|e| e.target_id.as_str()).collect();
        assert_eq!(targets, ["p3", "p2"]);
        assert_eq!(network.published_count().await, 3);
    }

    #[tokio::test]
    async fn test_disabled_log_still_counts() {
        let network = MemoryNetwork::<String>::with_config(MemoryNetworkConfig {
            log_capacity: 0,
            ..MemoryNetworkConfig::default()
        });
        let _p2 = network.subscribe(&"p2".into()).await.unwrap();

        network.publish(envelope("p2")).await.unwrap();
        assert!(network.published().await.is_empty());
        assert_eq!(network.published_count().await, 1);
    }

    #[tokio::test]
    async fn test_refused_subscribe() {
        let network = MemoryNetwork::<String>::new();
        network.set_subscribe_unavailable(true);
        assert!(network.subscribe(&"p2".into()).await.is_err());
        assert!(!network.is_subscribed(&"p2".into()).await);

        network.set_subscribe_unavailable(false);
        assert!(network.subscribe(&"p2".into()).await.is_ok());
    }
}
