//! Transport abstraction for envelope propagation.
//!
//! A transport delivers each envelope to the participant named in its
//! `target_id`. Delivery is best-effort and may repeat: the ring layer
//! deduplicates by message id, so implementations are free to redeliver.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use ring_relay_core::{ForwardEnvelope, ParticipantId, Payload};

use crate::error::Result;

/// Addressed publish/subscribe of forward envelopes.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport<P: Payload>: Send + Sync + 'static {
    /// Send an envelope to `envelope.target_id`.
    ///
    /// Envelopes addressed to a participant with no subscription are
    /// dropped silently; a departed participant is not an error.
    async fn publish(&self, envelope: ForwardEnvelope<P>) -> Result<()>;

    /// Start receiving envelopes addressed to `participant`.
    ///
    /// Subscribing again replaces the previous subscription.
    async fn subscribe(&self, participant: &ParticipantId) -> Result<Subscription<P>>;

    /// Stop receiving envelopes addressed to `participant`.
    async fn unsubscribe(&self, participant: &ParticipantId) -> Result<()>;
}

#[async_trait]
impl<P, T> Transport<P> for Arc<T>
where
    P: Payload,
    T: Transport<P> + ?Sized,
{
    async fn publish(&self, envelope: ForwardEnvelope<P>) -> Result<()> {
        (**self).publish(envelope).await
    }

    async fn subscribe(&self, participant: &ParticipantId) -> Result<Subscription<P>> {
        (**self).subscribe(participant).await
    }

    async fn unsubscribe(&self, participant: &ParticipantId) -> Result<()> {
        (**self).unsubscribe(participant).await
    }
}

/// Inbound envelope stream for one participant.
///
/// Backed by a bounded channel; the transport decides what happens when it
/// fills up.
#[derive(Debug)]
pub struct Subscription<P> {
    participant: ParticipantId,
    receiver: mpsc::Receiver<ForwardEnvelope<P>>,
}

impl<P> Subscription<P> {
    pub fn new(participant: ParticipantId, receiver: mpsc::Receiver<ForwardEnvelope<P>>) -> Self {
        Self {
            participant,
            receiver,
        }
    }

    /// The participant this subscription receives for.
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Receive the next envelope.
    ///
    /// Returns `None` once the transport has closed the subscription.
    pub async fn recv(&mut self) -> Option<ForwardEnvelope<P>> {
        self.receiver.recv().await
    }

    /// Take an envelope if one is already queued.
    pub fn try_recv(&mut self) -> Option<ForwardEnvelope<P>> {
        self.receiver.try_recv().ok()
    }
}
