//! # Ring Relay Core
//!
//! Pure primitives for the ring propagation overlay: participants, ring
//! ordering, forward envelopes, and the dedup cache.
//!
//! This crate contains no I/O, no tasks, no networking.
//!
//! ## Key Types
//!
//! - [`ParticipantId`] - Session participant identifier
//! - [`MessageId`] - Identifier shared by every copy of a message
//! - [`RingOrder`] - Deterministic ring membership, see [`compute_order`]
//! - [`ForwardEnvelope`] - One copy of a message addressed to one neighbor
//! - [`SeenCache`] - Bounded record of already delivered message ids

pub mod duration;
pub mod envelope;
pub mod error;
pub mod membership;
pub mod seen;
pub mod types;

pub use envelope::{ForwardEnvelope, Payload};
pub use error::RingError;
pub use membership::{compute_order, Neighbors, RingOrder};
pub use seen::{SeenCache, DEFAULT_SEEN_CAPACITY};
pub use types::{now_millis, Direction, Liveness, MessageId, Participant, ParticipantId};
