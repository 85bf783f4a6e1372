//! Bounded dedup cache of message identifiers.
//!
//! Only the most recently seen identifiers are kept. The capacity has to
//! cover every message still in flight around the ring; an identifier
//! evicted while copies are still circulating would be delivered again.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::types::MessageId;

/// Default number of identifiers remembered per node.
pub const DEFAULT_SEEN_CAPACITY: usize = 4096;

/// Fixed-capacity LRU set of seen message identifiers.
pub struct SeenCache {
    entries: LruCache<MessageId, ()>,
}

impl SeenCache {
    /// Create a cache remembering at most `capacity` identifiers.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Record an identifier.
    ///
    /// Returns `true` if the identifier was not already present.
    pub fn insert(&mut self, id: MessageId) -> bool {
        if self.entries.get(&id).is_some() {
            return false;
        }
        self.entries.put(id, ());
        true
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for SeenCache {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}

impl std::fmt::Debug for SeenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeenCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
