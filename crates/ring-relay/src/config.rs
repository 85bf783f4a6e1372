//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use ring_relay_core::duration::millis;
use ring_relay_node::NodeConfig;

/// Configuration for the ring coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Configuration handed to every node the coordinator spawns.
    pub node: NodeConfig,
    /// How long an unreachable participant keeps its ring slot before it is
    /// treated as departed.
    #[serde(with = "millis")]
    pub disconnect_grace: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            disconnect_grace: Duration::from_secs(10),
        }
    }
}

impl RelayConfig {
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.node = node;
        self
    }

    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }
}
