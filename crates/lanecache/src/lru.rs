//! LRU (Least Recently Used) eviction policy
//!
//! Pairs the arena-backed [`EvictionList`] with a key -> node index. Both are
//! mutated together under a single lock so callers never observe the list
//! and the index out of step. Values are not tracked here; they live in the
//! fast store.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use ahash::RandomState;
use parking_lot::{Condvar, Mutex};

use crate::list::EvictionList;

struct LruState<K> {
    list: EvictionList<K>,
    index: HashMap<K, usize, RandomState>,
}

/// Thread-safe recency tracker that picks eviction victims
pub struct LruEvictionPolicy<K> {
    state: Mutex<LruState<K>>,

    /// Signalled whenever a new key becomes evictable
    available: Condvar,
}

impl<K> LruEvictionPolicy<K>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty policy
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LruState {
                list: EvictionList::new(),
                index: HashMap::with_hasher(RandomState::new()),
            }),
            available: Condvar::new(),
        }
    }

    /// Mark `key` as the most recently used entry, tracking it if new
    pub fn touch(&self, key: &K) {
        let mut state = self.state.lock();

        if let Some(&idx) = state.index.get(key) {
            state.list.move_to_front(idx);
            return;
        }

        let idx = state.list.insert(key.clone());
        state.list.add_front(idx);
        state.index.insert(key.clone(), idx);
        drop(state);

        self.available.notify_all();
    }

    /// Remove and return the least recently used key
    pub fn evict_one(&self) -> Option<K> {
        let mut state = self.state.lock();

        let idx = state.list.tail_predecessor()?;
        let key = state.list.release(idx)?;
        state.index.remove(&key);
        Some(key)
    }

    /// Stop tracking `key`. Returns false if it was not tracked.
    pub fn remove(&self, key: &K) -> bool {
        let mut state = self.state.lock();

        match state.index.remove(key) {
            Some(idx) => {
                state.list.release(idx);
                true
            }
            None => false,
        }
    }

    /// Check if `key` is tracked
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().index.contains_key(key)
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.state.lock().list.len()
    }

    /// Check if no key is tracked
    pub fn is_empty(&self) -> bool {
        self.state.lock().list.is_empty()
    }

    /// Tracked keys from most to least recently used
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.state.lock().list.iter().cloned().collect()
    }

    /// Block until at least one key is tracked or `timeout` elapses.
    ///
    /// Returns whether a key is available.
    pub fn wait_for_entry(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        while state.list.is_empty() {
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return !state.list.is_empty();
            }
        }
        true
    }
}

impl<K> Default for LruEvictionPolicy<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
