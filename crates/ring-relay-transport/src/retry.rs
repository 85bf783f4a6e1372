//! Retry with exponential backoff around any transport.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ring_relay_core::duration::millis;
use ring_relay_core::{ForwardEnvelope, ParticipantId, Payload};

use crate::error::{Result, TransportError};
use crate::transport::{Subscription, Transport};

/// Retry budget for transport calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    /// Upper bound for the doubling delay.
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Transport wrapper retrying retryable failures.
///
/// Non-retryable errors are returned immediately. Once the budget is spent
/// the last error is returned to the caller.
pub struct RetryingTransport<T, P> {
    inner: T,
    policy: RetryPolicy,
    _payload: PhantomData<fn() -> P>,
}

impl<T, P> RetryingTransport<T, P>
where
    T: Transport<P>,
    P: Payload,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            _payload: PhantomData,
        }
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn pause(&self, attempt: u32, error: &TransportError, op: &str) {
        let delay = self.policy.backoff(attempt);
        tracing::debug!(op, attempt, ?delay, error = %error, "transport call failed, retrying");
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl<T, P> Transport<P> for RetryingTransport<T, P>
where
    T: Transport<P>,
    P: Payload,
{
    async fn publish(&self, envelope: ForwardEnvelope<P>) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.inner.publish(envelope.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    self.pause(attempt, &e, "publish").await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        message = %envelope.message_id,
                        participant = %envelope.target_id,
                        attempts = attempt,
                        error = %e,
                        "giving up on publish"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn subscribe(&self, participant: &ParticipantId) -> Result<Subscription<P>> {
        let mut attempt = 1;
        loop {
            match self.inner.subscribe(participant).await {
                Ok(subscription) => return Ok(subscription),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    self.pause(attempt, &e, "subscribe").await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn unsubscribe(&self, participant: &ParticipantId) -> Result<()> {
        self.inner.unsubscribe(participant).await
    }
}
