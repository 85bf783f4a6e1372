//! Per-node task.
//!
//! Each ring node runs as its own tokio task owning its [`RingNode`]. The
//! task multiplexes two bounded inputs: commands from the coordinator (or
//! the application) and envelopes from the transport. Both are handled on
//! the same loop, so a topology update never overlaps envelope handling.
//!
//! Forwards are fire-and-forget. Each publish runs in the node's `JoinSet`
//! under `publish_timeout`; a failure is logged and dropped, never reported
//! back to the sender. Shutting the node down aborts whatever is still
//! pending and releases the transport subscription.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};

use ring_relay_core::{
    Direction, ForwardEnvelope, MessageId, Neighbors, ParticipantId, Payload, RingError,
    RingOrder,
};
use ring_relay_transport::{Subscription, Transport, TransportError};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::state::{NodeStats, Reception, RingNode};

/// Local delivery callback, invoked once per distinct message.
pub type DeliveryHandler<P> = Arc<dyn Fn(&P) + Send + Sync>;

enum Command<P> {
    Initialize {
        order: Arc<RingOrder>,
        reply: oneshot::Sender<std::result::Result<Neighbors, RingError>>,
    },
    Originate {
        payload: P,
        hops: Option<u32>,
        reply: oneshot::Sender<std::result::Result<MessageId, RingError>>,
    },
    NeighborUnreachable {
        side: Direction,
    },
    NeighborReachable {
        participant: ParticipantId,
    },
    SetActive(bool),
    RegisterHandler(DeliveryHandler<P>),
    Stats {
        reply: oneshot::Sender<NodeStats>,
    },
    Neighbors {
        reply: oneshot::Sender<Neighbors>,
    },
    Suppressed {
        reply: oneshot::Sender<Vec<ParticipantId>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running ring node.
///
/// Cheap to clone. Every call goes through the node's mailbox.
pub struct NodeHandle<P> {
    participant: ParticipantId,
    commands: mpsc::Sender<Command<P>>,
}

impl<P> Clone for NodeHandle<P> {
    fn clone(&self) -> Self {
        Self {
            participant: self.participant.clone(),
            commands: self.commands.clone(),
        }
    }
}

impl<P> std::fmt::Debug for NodeHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("participant", &self.participant)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

/// Start a ring node for `participant`.
///
/// Subscribes to the transport first; the node has no neighbors until its
/// first `initialize`.
pub async fn spawn_node<P, T>(
    participant: ParticipantId,
    transport: Arc<T>,
    config: NodeConfig,
) -> Result<NodeHandle<P>>
where
    P: Payload,
    T: Transport<P>,
{
    let inbound = transport.subscribe(&participant).await?;
    let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));

    let actor = NodeActor {
        node: RingNode::new(participant.clone(), &config),
        transport,
        inbound: Some(inbound),
        commands: rx,
        handlers: Vec::new(),
        pending: JoinSet::new(),
        publish_timeout: config.publish_timeout,
    };
    tokio::spawn(actor.run());

    Ok(NodeHandle {
        participant,
        commands: tx,
    })
}

impl<P: Payload> NodeHandle<P> {
    /// The participant this node represents.
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Whether the node task has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Assign neighbors from a new ring order.
    pub async fn initialize(&self, order: Arc<RingOrder>) -> Result<Neighbors> {
        let neighbors = self
            .request(|reply| Command::Initialize { order, reply })
            .await??;
        Ok(neighbors)
    }

    /// Introduce a new message with the configured hop budget.
    pub async fn originate(&self, payload: P) -> Result<MessageId> {
        let id = self
            .request(|reply| Command::Originate {
                payload,
                hops: None,
                reply,
            })
            .await??;
        Ok(id)
    }

    /// Introduce a new message that travels at most `hops` hops.
    pub async fn originate_with_ttl(&self, payload: P, hops: u32) -> Result<MessageId> {
        let id = self
            .request(|reply| Command::Originate {
                payload,
                hops: Some(hops),
                reply,
            })
            .await??;
        Ok(id)
    }

    /// Report the neighbor on `side` as unreachable.
    pub async fn neighbor_unreachable(&self, side: Direction) -> Result<()> {
        self.send(Command::NeighborUnreachable { side }).await
    }

    /// Lift a previous unreachable report for `participant`.
    pub async fn neighbor_reachable(&self, participant: ParticipantId) -> Result<()> {
        self.send(Command::NeighborReachable { participant }).await
    }

    pub async fn set_active(&self, active: bool) -> Result<()> {
        self.send(Command::SetActive(active)).await
    }

    /// Register a local delivery handler for the node's lifetime.
    pub async fn register_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.send(Command::RegisterHandler(Arc::new(handler))).await
    }

    pub async fn stats(&self) -> Result<NodeStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Current neighbor pointers, with unreachable sides cleared.
    pub async fn neighbors(&self) -> Result<Neighbors> {
        self.request(|reply| Command::Neighbors { reply }).await
    }

    /// Neighbors this node has dropped and not yet had lifted.
    pub async fn suppressed(&self) -> Result<Vec<ParticipantId>> {
        self.request(|reply| Command::Suppressed { reply }).await
    }

    /// Stop the node and wait until its subscription is released.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn send(&self, command: Command<P>) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| NodeError::Closed(self.participant.clone()))
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command<P>) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await
            .map_err(|_| NodeError::Closed(self.participant.clone()))
    }
}

struct NodeActor<P, T> {
    node: RingNode,
    transport: Arc<T>,
    inbound: Option<Subscription<P>>,
    commands: mpsc::Receiver<Command<P>>,
    handlers: Vec<DeliveryHandler<P>>,
    pending: JoinSet<()>,
    publish_timeout: Duration,
}

impl<P, T> NodeActor<P, T>
where
    P: Payload,
    T: Transport<P>,
{
    async fn run(mut self) {
        tracing::debug!(participant = %self.node.self_id(), "ring node started");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.commands.close();
                        self.close().await;
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                Some(result) = self.pending.join_next(), if !self.pending.is_empty() => {
                    self.reap(result);
                }

                envelope = next_envelope(&mut self.inbound) => match envelope {
                    Some(envelope) => self.handle_envelope(envelope),
                    None => {
                        tracing::warn!(participant = %self.node.self_id(), "transport closed subscription");
                        self.inbound = None;
                    }
                },
            }
        }

        self.close().await;
    }

    fn handle_command(&mut self, command: Command<P>) {
        match command {
            Command::Initialize { order, reply } => {
                let result = self.node.initialize(&order).cloned();
                match &result {
                    Ok(neighbors) => tracing::debug!(
                        participant = %self.node.self_id(),
                        left = ?neighbors.left,
                        right = ?neighbors.right,
                        "neighbors assigned"
                    ),
                    Err(e) => tracing::warn!(participant = %self.node.self_id(), error = %e, "initialize rejected"),
                }
                let _ = reply.send(result);
            }
            Command::Originate {
                payload,
                hops,
                reply,
            } => {
                let result = match hops {
                    Some(hops) => self.node.originate_with_ttl(payload, hops),
                    None => self.node.originate(payload),
                };
                let result = result.map(|origination| {
                    tracing::debug!(
                        participant = %self.node.self_id(),
                        message = %origination.message_id,
                        copies = origination.envelopes.len(),
                        "originated message"
                    );
                    for envelope in origination.envelopes {
                        self.dispatch(envelope);
                    }
                    origination.message_id
                });
                let _ = reply.send(result);
            }
            Command::NeighborUnreachable { side } => {
                if let Some(dropped) = self.node.neighbor_unreachable(side) {
                    tracing::info!(
                        participant = %self.node.self_id(),
                        neighbor = %dropped,
                        side = %side,
                        "neighbor unreachable"
                    );
                }
            }
            Command::NeighborReachable { participant } => {
                self.node.neighbor_reachable(&participant);
            }
            Command::SetActive(active) => self.node.set_active(active),
            Command::RegisterHandler(handler) => self.handlers.push(handler),
            Command::Stats { reply } => {
                let _ = reply.send(self.node.stats());
            }
            Command::Neighbors { reply } => {
                let _ = reply.send(self.node.neighbors().clone());
            }
            Command::Suppressed { reply } => {
                let _ = reply.send(self.node.suppressed());
            }
            // Handled by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn handle_envelope(&mut self, envelope: ForwardEnvelope<P>) {
        let message_id = envelope.message_id;
        match self.node.receive(envelope) {
            Reception::Duplicate => {
                tracing::trace!(participant = %self.node.self_id(), message = %message_id, "duplicate absorbed");
            }
            Reception::Delivered { payload, forward } => {
                tracing::debug!(participant = %self.node.self_id(), message = %message_id, "delivered");
                for handler in &self.handlers {
                    handler(&payload);
                }
                if let Some(next) = forward {
                    self.dispatch(next);
                }
            }
        }
    }

    fn dispatch(&mut self, envelope: ForwardEnvelope<P>) {
        let transport = Arc::clone(&self.transport);
        let timeout = self.publish_timeout;
        self.pending.spawn(async move {
            let message_id = envelope.message_id;
            let target = envelope.target_id.clone();
            let result = match tokio::time::timeout(timeout, transport.publish(envelope)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout)),
            };
            if let Err(e) = result {
                tracing::warn!(message = %message_id, neighbor = %target, error = %e, "forward dropped");
            }
        });
    }

    fn reap(&self, result: std::result::Result<(), JoinError>) {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!(participant = %self.node.self_id(), "forward task panicked");
            }
        }
    }

    async fn close(&mut self) {
        self.pending.abort_all();
        while self.pending.join_next().await.is_some() {}

        self.inbound = None;
        if let Err(e) = self.transport.unsubscribe(self.node.self_id()).await {
            tracing::warn!(participant = %self.node.self_id(), error = %e, "unsubscribe failed");
        }
        tracing::debug!(participant = %self.node.self_id(), "ring node stopped");
    }
}

async fn next_envelope<P>(inbound: &mut Option<Subscription<P>>) -> Option<ForwardEnvelope<P>> {
    match inbound {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
