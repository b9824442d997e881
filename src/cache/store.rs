//! Bounded LRU storage for rendered content.

use std::{hash::Hash, num::NonZeroUsize, sync::Mutex};

use lru::LruCache;

use crate::lock::mutex_lock;

const SOURCE: &str = "cache::store";

/// Callback invoked with every entry that leaves the cache through eviction or removal.
pub type EvictionHook<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

/// Fixed-capacity key/value store with least-recently-used eviction.
///
/// Lookups through [`BoundedCache::get`] count as a use and promote the entry,
/// so every method takes `&self`; recency bookkeeping is guarded by an internal
/// mutex that is never held while the eviction hook runs.
pub struct BoundedCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, V>>,
    on_evict: EvictionHook<K, V>,
}

impl<K: Hash + Eq + 'static, V: Clone + 'static> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries with a no-op eviction hook.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_eviction_hook(capacity, Box::new(|_: &K, _: &V| {}))
    }

    pub fn with_eviction_hook(capacity: NonZeroUsize, on_evict: EvictionHook<K, V>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            on_evict,
        }
    }

    /// Look up `key`, promoting it to most-recently-used on a hit.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        mutex_lock(&self.entries, SOURCE, "get").get(key).cloned()
    }

    /// Insert or replace `key`. Returns the key of the entry evicted to make room, if any.
    ///
    /// Replacing the value of a key that is already cached is not an eviction and
    /// does not invoke the hook.
    pub fn put(&self, key: K, value: V) -> Option<K> {
        let evicted = {
            let mut entries = mutex_lock(&self.entries, SOURCE, "put");
            if entries.contains(&key) {
                entries.put(key, value);
                None
            } else {
                entries.push(key, value)
            }
        };

        evicted.map(|(evicted_key, evicted_value)| {
            (self.on_evict)(&evicted_key, &evicted_value);
            evicted_key
        })
    }

    /// Remove `key`, invoking the eviction hook on the removed value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = mutex_lock(&self.entries, SOURCE, "remove").pop_entry(key);
        removed.map(|(removed_key, value)| {
            (self.on_evict)(&removed_key, &value);
            value
        })
    }

    /// Visit every live entry from most- to least-recently-used.
    ///
    /// Iteration stops at the first error returned by `visitor`. Visiting does not
    /// change recency.
    pub fn walk<E, F>(&self, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&K, &V) -> Result<(), E>,
    {
        let entries = mutex_lock(&self.entries, SOURCE, "walk");
        for (key, value) in entries.iter() {
            visitor(key, value)?;
        }
        Ok(())
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        mutex_lock(&self.entries, SOURCE, "contains").contains(key)
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
