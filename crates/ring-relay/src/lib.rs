//! # Ring Relay
//!
//! Bidirectional, hop-limited message flooding over a logical ring of
//! session participants.
//!
//! ## Overview
//!
//! Every active participant gets a ring node with a left and a right
//! neighbor, derived from a deterministic order over `(joined_at, id)`. A
//! message originated at one node travels both ways around the ring; every
//! node delivers it once, then hands it on with one hop less until the hop
//! budget runs out or the next hop would be the origin.
//!
//! - **Coordinator**: keeps the node set and neighbor assignments in step
//!   with roster events
//! - **Nodes**: one task per participant, dedup and relaying
//! - **Transport**: pluggable delivery of envelopes between nodes
//!
//! Delivery is best effort. There is no ordering across messages and no
//! consensus; duplicates created during reconfiguration are absorbed by each
//! node's dedup cache.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ring_relay::{RelayConfig, RingCoordinator};
//! use ring_relay::core::Participant;
//! use ring_relay::transport::MemoryNetwork;
//!
//! async fn example() {
//!     let network = MemoryNetwork::<String>::new();
//!     let mut relay = RingCoordinator::<String, _>::new(network, RelayConfig::default());
//!
//!     let roster = vec![Participant::active("alice", 1), Participant::active("bob", 2)];
//!     relay.on_participant_joined(roster[0].clone(), &roster).await.unwrap();
//!
//!     relay
//!         .register_handler(&"bob".into(), |payload: &String| println!("bob got {payload}"))
//!         .await
//!         .unwrap();
//!     relay.originate(&"alice".into(), "hello".to_string()).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `ring_relay::core` - participants, ordering, envelopes, dedup cache
//! - `ring_relay::transport` - transport trait and implementations
//! - `ring_relay::node` - ring node state machine and node tasks

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod roster;

pub use config::RelayConfig;
pub use coordinator::{MemberState, RingCoordinator};
pub use driver::run_coordinator;
pub use error::{RelayError, Result};
pub use roster::RosterEvent;

// Re-export component crates
pub use ring_relay_core as core;
pub use ring_relay_node as node;
pub use ring_relay_transport as transport;

// Re-export commonly used types
pub use ring_relay_core::{
    compute_order, Direction, MessageId, Participant, ParticipantId, RingError, RingOrder,
};
pub use ring_relay_node::{NodeConfig, NodeHandle, NodeStats, Topology};
pub use ring_relay_transport::{MemoryNetwork, Transport, TransportError};
