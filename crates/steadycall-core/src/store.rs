//! Keyed singleton store.
//!
//! Breakers and bulkheads are created lazily on first use of a key and then
//! shared by every call that targets it. Creation goes through the
//! `DashMap` entry API so concurrent first uses agree on one value.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Concurrent map of lazily created, shared values.
pub struct KeyedStore<K, V> {
    entries: DashMap<K, Arc<V>>,
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the value for `key`, creating it with `init` when absent.
    ///
    /// `init` runs at most once per key, under the shard lock.
    pub fn get_or_create<F>(&self, key: &K, init: F) -> Arc<V>
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(existing) = self.entries.get(key) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(init(key)));
        Arc::clone(entry.value())
    }

    /// Returns the value for `key` without creating it.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the current keys.
    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&K, &Arc<V>) -> bool,
    {
        self.entries.retain(|key, value| keep(key, value));
    }
}

impl<K, V> Default for KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for KeyedStore<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedStore")
            .field("len", &self.entries.len())
            .finish()
    }
}
