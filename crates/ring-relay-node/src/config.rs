//! Node configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use ring_relay_core::duration::millis;
use ring_relay_core::DEFAULT_SEEN_CAPACITY;

/// Default hop budget for originated messages.
pub const DEFAULT_TTL: u32 = 10;

/// Configuration for ring nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Hop budget given to originated messages.
    pub default_ttl: u32,
    /// Message identifiers remembered for dedup.
    pub seen_capacity: usize,
    /// Capacity of the node's command mailbox.
    pub mailbox_capacity: usize,
    /// Upper bound on a single forward.
    #[serde(with = "millis")]
    pub publish_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            seen_capacity: DEFAULT_SEEN_CAPACITY,
            mailbox_capacity: 256,
            publish_timeout: Duration::from_secs(2),
        }
    }
}

impl NodeConfig {
    pub fn with_default_ttl(mut self, ttl: u32) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_seen_capacity(mut self, capacity: usize) -> Self {
        self.seen_capacity = capacity;
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.default_ttl, 10);
        assert_eq!(config.seen_capacity, DEFAULT_SEEN_CAPACITY);
    }

    #[test]
    fn test_partial_json() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"default_ttl":3,"publish_timeout":250}"#).unwrap();
        assert_eq!(config.default_ttl, 3);
        assert_eq!(config.publish_timeout, Duration::from_millis(250));
        assert_eq!(config.mailbox_capacity, 256);
    }
}
