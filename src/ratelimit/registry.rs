//! Bounded counter registry with LRU eviction and passive expiry.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tracing::debug;

use super::counter::CounterEntry;
use super::key::RateLimitKey;

/// A capacity-bounded map from [`RateLimitKey`] to [`CounterEntry`].
///
/// Entries are ordered by last touch. Inserting a new key at capacity drops
/// the least recently touched entry. An entry that has not been written for
/// a whole `ttl` is treated as absent and dropped when next looked up.
pub struct Registry {
    entries: LruCache<RateLimitKey, CounterEntry>,
    ttl: Duration,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Get the live entry for `key`, creating it with `init` if absent or
    /// expired. The entry becomes the most recently touched.
    pub fn get_or_insert_with<F>(
        &mut self,
        key: &RateLimitKey,
        now: Duration,
        init: F,
    ) -> &mut CounterEntry
    where
        F: FnOnce() -> CounterEntry,
    {
        let expired = self
            .entries
            .peek(key)
            .is_some_and(|entry| entry.is_expired(self.ttl, now));
        if expired {
            debug!(key = %key, "Dropping expired counter");
            self.entries.pop(key);
        }

        if !self.entries.contains(key) && self.entries.len() == self.capacity() {
            if let Some((evicted, _)) = self.entries.pop_lru() {
                debug!(evicted = %evicted, "Evicted least recently used counter");
            }
        }

        self.entries.get_or_insert_mut(key.clone(), init)
    }

    /// Look at a live entry without touching its recency.
    pub fn peek(&self, key: &RateLimitKey, now: Duration) -> Option<&CounterEntry> {
        self.entries
            .peek(key)
            .filter(|entry| !entry.is_expired(self.ttl, now))
    }

    /// Whether `key` is still stored, live or not.
    pub fn contains(&self, key: &RateLimitKey) -> bool {
        self.entries.contains(key)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
