//! In-memory fast store

use std::collections::HashMap;
use std::hash::Hash;

use ahash::RandomState;
use parking_lot::RwLock;

/// Concurrent key -> value map holding the cached entries
pub struct FastStore<K, V> {
    map: RwLock<HashMap<K, V, RandomState>>,
}

impl<K, V> FastStore<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Create a store sized for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: RwLock::new(HashMap::with_capacity_and_hasher(
                capacity,
                RandomState::new(),
            )),
        }
    }

    /// Get a copy of the value stored under `key`
    pub fn get(&self, key: &K) -> Option<V> {
        self.map.read().get(key).cloned()
    }

    /// Insert or replace the value under `key`
    pub fn put(&self, key: K, value: V) {
        self.map.write().insert(key, value);
    }

    /// Remove `key`; returns whether it was present
    pub fn delete(&self, key: &K) -> bool {
        self.map.write().remove(key).is_some()
    }

    /// Check if `key` is present
    pub fn contains(&self, key: &K) -> bool {
        self.map.read().contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl<K, V> Default for FastStore<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
