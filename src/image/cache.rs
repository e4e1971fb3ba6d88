// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! LRU cache from cell-sequence fingerprint to encoded string (§3
//! "ImageCache entry", §4.2 "Image run detection and cache").
//!
//! Grounded on `r3bl_tui::core::common::lru_cache::LruCache`: an
//! `FxHashMap` plus a monotonic access counter standing in for a
//! last-used timestamp, giving O(1) true-LRU semantics without a linked
//! list. Unlike the teacher's generic cache, eviction here is exposed
//! explicitly (`evicted_key_on_insert`) so callers can assert the §8
//! invariant in tests.

use std::sync::Mutex;

use rustc_hash::FxHashMap;

struct Entry {
    data: String,
    last_used: u64,
}

/// Thread-safe LRU cache keyed by the concatenation of per-cell content
/// fingerprints (§3 "key = concatenation of per-cell fingerprints").
///
/// Invariant: `len() <= capacity` always; eviction on insert-at-capacity
/// drops the minimum-`last_used` entry (§8).
pub struct ImageCache {
    inner: Mutex<Inner>,
}

struct Inner {
    map: FxHashMap<String, Entry>,
    capacity: usize,
    clock: u64,
}

impl ImageCache {
    /// # Panics
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "image cache capacity must be greater than 0");
        Self {
            inner: Mutex::new(Inner { map: FxHashMap::default(), capacity, clock: 0 }),
        }
    }

    /// Looks up `key`, bumping its last-used timestamp on a hit (§3
    /// "reads update the timestamp").
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;
        if let Some(entry) = inner.map.get_mut(key) {
            entry.last_used = clock;
            Some(entry.data.clone())
        } else {
            None
        }
    }

    /// Inserts `key -> data`, evicting the least-recently-used entry first
    /// if at capacity. Returns the evicted key, if any, so tests can
    /// assert the eviction invariant directly.
    pub fn insert(&self, key: String, data: String) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;

        let mut evicted = None;
        if !inner.map.contains_key(&key) && inner.map.len() >= inner.capacity {
            if let Some(oldest_key) = inner
                .map
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.map.remove(&oldest_key);
                evicted = Some(oldest_key);
            }
        }

        inner.map.insert(key, Entry { data, last_used: clock });
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize { self.inner.lock().unwrap().map.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    #[must_use]
    pub fn capacity(&self) -> usize { self.inner.lock().unwrap().capacity }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_capacity() {
        let cache = ImageCache::new(3);
        for i in 0..10 {
            cache.insert(format!("k{i}"), format!("v{i}"));
            assert!(cache.len() <= 3);
        }
    }

    #[test]
    fn evicts_oldest_timestamped_entry() {
        let cache = ImageCache::new(2);
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        // Touch "a" so "b" becomes the least-recently-used entry.
        cache.get("a");
        let evicted = cache.insert("c".into(), "3".into());
        assert_eq!(evicted, Some("b".to_string()));
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn get_updates_timestamp() {
        let cache = ImageCache::new(2);
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.get("a");
        cache.get("a");
        let evicted = cache.insert("c".into(), "3".into());
        assert_eq!(evicted, Some("b".to_string()), "a was touched most recently, b must go");
    }
}
