//! Bounded cache for expensive per-entity results such as image listings.

use log::debug;
use std::collections::HashMap;

pub const DEFAULT_CACHE_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    /// Logical time of the last put or hit; larger is more recent
    pub timestamp: u64,
}

/// Key → payload cache with least-recently-touched eviction.
///
/// Reads and writes both renew an entry's timestamp. When an insert pushes
/// the entry count over the bound, entries are sorted by timestamp and the
/// oldest are dropped until the bound holds again. Eviction is silent; a
/// later miss simply refetches.
#[derive(Debug)]
pub struct ResultCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    capacity: usize,
    clock: u64,
}

impl<T> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl<T> ResultCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up `key`, renewing its timestamp on a hit.
    pub fn get(&mut self, key: &str) -> Option<&T> {
        let stamp = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.timestamp = stamp;
        Some(&entry.payload)
    }

    /// Look up `key` without touching its timestamp.
    pub fn peek(&self, key: &str) -> Option<&T> {
        self.entries.get(key).map(|entry| &entry.payload)
    }

    /// Mutable access for in-place patches; does not count as a touch.
    pub fn peek_mut(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key).map(|entry| &mut entry.payload)
    }

    pub fn put(&mut self, key: &str, payload: T) {
        let stamp = self.tick();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.payload = payload;
                entry.timestamp = stamp;
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        key: key.to_string(),
                        payload,
                        timestamp: stamp,
                    },
                );
                self.evict_overflow();
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.entries.remove(key).map(|entry| entry.payload)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn evict_overflow(&mut self) {
        if self.entries.len() <= self.capacity {
            return;
        }
        let mut by_age: Vec<(u64, String)> = self
            .entries
            .values()
            .map(|entry| (entry.timestamp, entry.key.clone()))
            .collect();
        by_age.sort_unstable();

        let excess = self.entries.len() - self.capacity;
        for (_, key) in by_age.into_iter().take(excess) {
            debug!("Evicting cached result for {key}");
            self.entries.remove(&key);
        }
    }
}
