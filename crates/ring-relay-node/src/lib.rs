//! # Ring Relay Node
//!
//! A ring node is one participant's view of the ring: two neighbor
//! pointers, a dedup cache, and the rules for originating and relaying
//! messages.
//!
//! ## Layers
//!
//! - [`RingNode`] - synchronous state machine, no I/O
//! - [`spawn_node`] / [`NodeHandle`] - one tokio task per node, bounded
//!   mailbox, fire-and-forget forwarding through a [`Transport`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ring_relay_core::{compute_order, Participant};
//! use ring_relay_node::{spawn_node, NodeConfig};
//! use ring_relay_transport::MemoryNetwork;
//!
//! async fn example() {
//!     let network = MemoryNetwork::<String>::new();
//!     let order = Arc::new(compute_order(&[
//!         Participant::active("alice", 0),
//!         Participant::active("bob", 1),
//!     ]));
//!
//!     let alice = spawn_node::<String, _>("alice".into(), network.clone(), NodeConfig::default())
//!         .await
//!         .unwrap();
//!     alice.initialize(order).await.unwrap();
//!     let message_id = alice.originate("hello".to_string()).await.unwrap();
//! }
//! ```
//!
//! [`Transport`]: ring_relay_transport::Transport

pub mod actor;
pub mod config;
pub mod error;
pub mod state;

pub use actor::{spawn_node, DeliveryHandler, NodeHandle};
pub use config::{NodeConfig, DEFAULT_TTL};
pub use error::{NodeError, Result};
pub use state::{NodeStats, Origination, Reception, RingNode, Topology};
