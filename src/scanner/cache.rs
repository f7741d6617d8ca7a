// src/scanner/cache.rs

//! Bounded LRU cache for revision manifests
//!
//! Recency is tracked with a logical clock instead of wall time, so
//! eviction order only depends on the order of calls.

use super::source::{Manifest, Revision, RevisionSource};
use crate::error::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Manifests kept by default
pub const DEFAULT_CAPACITY: usize = 16;

struct CacheEntry<V> {
    value: V,
    last_used: u64,
}

/// Least-recently-used cache with a fixed capacity
pub struct LruCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    capacity: usize,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = tick;
            entry.value.clone()
        })
    }

    pub fn put(&mut self, key: K, value: V) {
        self.tick += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                last_used: self.tick,
            },
        );
    }

    fn evict_lru(&mut self) {
        if let Some(key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}

/// Manifest cache keyed by revision sequence number
pub struct ManifestCache {
    inner: LruCache<i64, Arc<Manifest>>,
}

impl Default for ManifestCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ManifestCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Cached manifest for `rev`, loading it from `source` on a miss
    pub fn manifest<S: RevisionSource + ?Sized>(
        &mut self,
        source: &S,
        rev: &Revision,
    ) -> Result<Arc<Manifest>> {
        if let Some(manifest) = self.inner.get(&rev.seq) {
            return Ok(manifest);
        }
        let manifest = Arc::new(source.manifest(rev)?);
        self.inner.put(rev.seq, Arc::clone(&manifest));
        Ok(manifest)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
