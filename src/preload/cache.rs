//! Bounded cache of decoded images keyed by list index.
//!
//! Entries are kept in least-recently-used order. When the cache grows past its
//! capacity, the oldest entries that the caller does not protect are evicted;
//! protected entries (the current image and the live window) are skipped, so the
//! cache may briefly hold more than its capacity.

use lru::LruCache;
use tracing::trace;

pub struct ImageCache<V> {
    entries: LruCache<usize, V>,
    /// Entries kept before eviction starts (>= 1)
    capacity: usize,
}

impl<V> ImageCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains(&index)
    }

    /// Insert as the most recently used entry
    pub fn insert(&mut self, index: usize, value: V) {
        self.entries.put(index, value);
    }

    /// Look up without touching the recency order
    pub fn peek(&self, index: usize) -> Option<&V> {
        self.entries.peek(&index)
    }

    pub fn peek_mut(&mut self, index: usize) -> Option<&mut V> {
        self.entries.peek_mut(&index)
    }

    /// Mark an entry as just displayed
    pub fn touch(&mut self, index: usize) {
        self.entries.promote(&index);
    }

    pub fn remove(&mut self, index: usize) -> Option<V> {
        self.entries.pop(&index)
    }

    /// Cached indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.entries.iter().map(|(k, _)| *k).collect();
        indices.sort_unstable();
        indices
    }

    /// Evict least recently used entries not matched by `protected` until the
    /// cache fits its capacity. Returns the evicted indices.
    pub fn evict(&mut self, protected: impl Fn(usize) -> bool) -> Vec<usize> {
        let mut evicted = Vec::new();

        while self.entries.len() > self.capacity {
            // Iteration runs from most to least recently used
            let victim = self
                .entries
                .iter()
                .rev()
                .map(|(k, _)| *k)
                .find(|k| !protected(*k));

            match victim {
                Some(index) => {
                    self.entries.pop(&index);
                    trace!(index, "Evicted image from cache");
                    evicted.push(index);
                }
                // Everything left is protected
                None => break,
            }
        }

        evicted
    }
}
