//! Fixed-capacity least-recently-used cache.
//!
//! Entries live in a hash map; a recency queue orders their keys from least
//! to most recently used. Capacities in this crate are small, so the queue is
//! scanned linearly when an entry is touched.

use std::borrow::Borrow;
use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;

use ahash::AHashMap;

type EvictionCallback<K, V> = Box<dyn FnMut(&K, &V) + Send>;

/// Bounded LRU cache with an eviction hook.
pub struct LruCache<K, V> {
    capacity: usize,
    entries: AHashMap<K, V>,
    recency: VecDeque<K>,
    on_evict: Option<EvictionCallback<K, V>>,
    evictions: u64,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        LruCache {
            capacity,
            entries: AHashMap::with_capacity(capacity),
            recency: VecDeque::with_capacity(capacity),
            on_evict: None,
            evictions: 0,
        }
    }

    /// Install a callback invoked for every entry pushed out by capacity.
    ///
    /// Explicit removals through [`LruCache::remove`] do not invoke it.
    pub fn with_eviction_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&K, &V) + Send + 'static,
    {
        self.on_evict = Some(Box::new(callback));
        self
    }

    fn touch<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(index) = self.recency.iter().position(|k| k.borrow() == key) {
            if let Some(k) = self.recency.remove(index) {
                self.recency.push_back(k);
            }
        }
    }

    /// Get an entry and mark it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.entries.get(key)
    }

    /// Get an entry without changing its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    /// Check whether a key is cached.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Insert an entry, evicting the least recently used one when full.
    ///
    /// Returns the previous value stored under the same key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(previous) = self.entries.insert(key.clone(), value) {
            self.touch(&key);
            return Some(previous);
        }

        self.recency.push_back(key);
        while self.entries.len() > self.capacity {
            self.evict_oldest();
        }
        None
    }

    fn evict_oldest(&mut self) {
        let Some(oldest) = self.recency.pop_front() else {
            return;
        };
        if let Some(value) = self.entries.remove(&oldest) {
            self.evictions += 1;
            if let Some(callback) = self.on_evict.as_mut() {
                callback(&oldest, &value);
            }
        }
    }

    /// Invalidate an entry.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.entries.remove(key)?;
        self.recency.retain(|k| k.borrow() != key);
        Some(value)
    }

    /// Drop every entry without invoking the eviction callback.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.recency.iter()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted by capacity so far.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

impl<K: fmt::Debug, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("recency", &self.recency)
            .field("evictions", &self.evictions)
            .finish()
    }
}
