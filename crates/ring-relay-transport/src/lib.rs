//! # Ring Relay Transport
//!
//! The boundary between ring nodes and whatever actually moves bytes.
//!
//! ## Overview
//!
//! Ring nodes only ever need two capabilities: publish an envelope
//! addressed to a neighbor, and receive envelopes addressed to themselves.
//! The [`Transport`] trait captures exactly that, so the ring layer never
//! depends on a concrete store or message queue.
//!
//! ## Implementations
//!
//! - [`MemoryNetwork`] - in-process channels with failure injection, for tests
//! - [`BusTransport`] - shared pub/sub topic carrying CBOR frames
//! - [`RetryingTransport`] - exponential backoff around any of the above
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ring_relay_transport::{MemoryNetwork, RetryPolicy, RetryingTransport, Transport};
//!
//! async fn example() {
//!     let network = MemoryNetwork::<String>::new();
//!     let transport = RetryingTransport::<_, String>::new(network, RetryPolicy::default());
//!     let _inbox = transport.subscribe(&"p1".into()).await.unwrap();
//!     // let envelope = inbox.recv().await;
//! }
//! ```

pub mod bus;
pub mod codec;
pub mod error;
pub mod memory;
pub mod retry;
pub mod transport;

pub use bus::BusTransport;
pub use codec::{decode_envelope, encode_envelope};
pub use error::{Result, TransportError};
pub use memory::{MemoryNetwork, MemoryNetworkConfig};
pub use retry::{RetryPolicy, RetryingTransport};
pub use transport::{Subscription, Transport};
