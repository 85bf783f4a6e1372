//! # Ring Relay Testkit
//!
//! Testing utilities for Ring Relay.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Scenario vectors**: reference floods with the exact set of participants
//!   that must receive them
//! - **Generators**: Proptest strategies for rosters, flood parameters and
//!   shuffled join/leave histories
//! - **Fixtures**: a ready-made ring over the in-memory network
//! - **Recorder**: a delivery sink shared by every node in a test
//!
//! ## Scenario Vectors
//!
//! ```rust,no_run
//! use ring_relay_testkit::scenarios::verify_all_scenarios;
//!
//! async fn check() {
//!     for (name, passed, detail) in verify_all_scenarios().await {
//!         println!("{name}: {passed} {detail}");
//!     }
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ring_relay_testkit::generators::{roster_history, settled_order};
//!
//! proptest! {
//!     #[test]
//!     fn settles_regardless_of_order(history in roster_history(5, 20)) {
//!         let order = settled_order(&history);
//!         // apply `history` to a coordinator and compare
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use ring_relay_testkit::fixtures::{settle, TestRing};
//!
//! async fn example() {
//!     let ring = TestRing::new(4).await.unwrap();
//!     ring.originate("p1", "hello").await.unwrap();
//!     settle().await;
//!     assert_eq!(ring.recorder.len(), 3);
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod recorder;
pub mod scenarios;

pub use fixtures::{init_test_tracing, participant, roster, settle, shuffled_roster, TestRing};
pub use generators::{roster_history, settled_order, RingParams, RosterOp};
pub use recorder::{Delivery, Recorder};
pub use scenarios::{
    all_scenarios, check_scenario, run_scenario, scenarios_json, verify_all_scenarios,
    ScenarioVector,
};
