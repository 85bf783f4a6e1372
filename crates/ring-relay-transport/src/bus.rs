//! Broadcast-bus transport.
//!
//! All participants share one pub/sub topic carrying CBOR frames. Each
//! subscriber runs a filter task that decodes frames and keeps the ones
//! addressed to it. A subscriber that falls behind loses the oldest frames
//! rather than stalling publishers.

use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use ring_relay_core::{ForwardEnvelope, ParticipantId, Payload};

use crate::codec::{decode_envelope, encode_envelope};
use crate::error::Result;
use crate::transport::{Subscription, Transport};

/// Pub/sub transport over a shared broadcast topic.
pub struct BusTransport<P> {
    topic: broadcast::Sender<Bytes>,
    filters: Mutex<HashMap<ParticipantId, JoinHandle<()>>>,
    inbox_capacity: usize,
    _payload: PhantomData<fn() -> P>,
}

impl<P> BusTransport<P>
where
    P: Payload + Serialize + DeserializeOwned,
{
    /// Create a bus retaining up to `topic_capacity` frames per subscriber.
    pub fn new(topic_capacity: usize, inbox_capacity: usize) -> Self {
        let (topic, _) = broadcast::channel(topic_capacity.max(1));
        Self {
            topic,
            filters: Mutex::new(HashMap::new()),
            inbox_capacity: inbox_capacity.max(1),
            _payload: PhantomData,
        }
    }

    /// Number of participants with a running filter.
    pub async fn subscriber_count(&self) -> usize {
        self.filters.lock().await.len()
    }
}

impl<P> Drop for BusTransport<P> {
    fn drop(&mut self) {
        for (_, task) in self.filters.get_mut().drain() {
            task.abort();
        }
    }
}

#[async_trait]
impl<P> Transport<P> for BusTransport<P>
where
    P: Payload + Serialize + DeserializeOwned,
{
    async fn publish(&self, envelope: ForwardEnvelope<P>) -> Result<()> {
        let frame = encode_envelope(&envelope)?;
        if self.topic.send(frame).is_err() {
            tracing::trace!(participant = %envelope.target_id, "bus has no subscribers");
        }
        Ok(())
    }

    async fn subscribe(&self, participant: &ParticipantId) -> Result<Subscription<P>> {
        let (tx, rx) = mpsc::channel(self.inbox_capacity);
        let frames = self.topic.subscribe();
        let task = tokio::spawn(filter_frames(participant.clone(), frames, tx));

        if let Some(previous) = self.filters.lock().await.insert(participant.clone(), task) {
            previous.abort();
        }
        Ok(Subscription::new(participant.clone(), rx))
    }

    async fn unsubscribe(&self, participant: &ParticipantId) -> Result<()> {
        if let Some(task) = self.filters.lock().await.remove(participant) {
            task.abort();
        }
        Ok(())
    }
}

async fn filter_frames<P: DeserializeOwned>(
    participant: ParticipantId,
    mut frames: broadcast::Receiver<Bytes>,
    inbox: mpsc::Sender<ForwardEnvelope<P>>,
) {
    loop {
        let frame = match frames.recv().await {
            Ok(frame) => frame,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(participant = %participant, skipped, "bus subscriber lagged, dropped oldest frames");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let envelope: ForwardEnvelope<P> = match decode_envelope(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(participant = %participant, error = %e, "undecodable bus frame");
                continue;
            }
        };

        if envelope.target_id != participant {
            continue;
        }
        if inbox.send(envelope).await.is_err() {
            break;
        }
    }
    tracing::debug!(participant = %participant, "bus filter stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring_relay_core::{Direction, MessageId};

    fn envelope(target: &str, n: u8) -> ForwardEnvelope<String> {
        ForwardEnvelope {
            message_id: MessageId::from_bytes([n; 32]),
            payload: format!("msg-{n}"),
            origin_id: ParticipantId::from("p1"),
            ttl: 2,
            direction: Direction::Left,
            target_id: ParticipantId::from(target),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_bus_filters_by_target() {
        let bus = BusTransport::<String>::new(64, 16);
        let mut p2 = bus.subscribe(&"p2".into()).await.unwrap();
        let mut p3 = bus.subscribe(&"p3".into()).await.unwrap();

        bus.publish(envelope("p3", 1)).await.unwrap();
        bus.publish(envelope("p2", 2)).await.unwrap();

        assert_eq!(p2.recv().await.unwrap().payload, "msg-2");
        assert_eq!(p3.recv().await.unwrap().payload, "msg-1");
        assert!(p2.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_bus_unsubscribe_closes_stream() {
        let bus = BusTransport::<String>::new(64, 16);
        let mut p2 = bus.subscribe(&"p2".into()).await.unwrap();
        bus.unsubscribe(&"p2".into()).await.unwrap();

        assert_eq!(bus.subscriber_count().await, 0);
        assert!(p2.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = BusTransport::<String>::new(4, 4);
        assert!(bus.publish(envelope("nobody", 1)).await.is_ok());
    }
}
