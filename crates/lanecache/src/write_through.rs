//! Write-through policy
//!
//! A write goes to the fast store and the durable store at the same time and
//! is acknowledged only once both have finished. Nothing is rolled back here;
//! the cache decides what to do with a failed write.

use std::hash::Hash;
use std::sync::Arc;
use std::thread;

use lanestore::DurableStore;

use crate::error::Result;
use crate::fast::FastStore;

/// Writes every entry to both stores before returning
pub struct WriteThrough<K, V, D> {
    fast: Arc<FastStore<K, V>>,
    durable: Arc<D>,
}

impl<K, V, D> WriteThrough<K, V, D>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
    D: DurableStore<K, V>,
{
    /// Create a policy writing to `fast` and `durable`
    pub fn new(fast: Arc<FastStore<K, V>>, durable: Arc<D>) -> Self {
        Self { fast, durable }
    }

    /// The durable store this policy writes to
    pub fn durable(&self) -> &D {
        &self.durable
    }

    /// Put `value` under `key` in both stores concurrently
    pub fn write(&self, key: K, value: V) -> Result<()> {
        let durable = &*self.durable;
        let (durable_key, durable_value) = (key.clone(), value.clone());

        // Scoped so the durable half can borrow the store. Writes already run
        // one at a time per lane, so a pooled worker would only add a hop.
        thread::scope(|scope| {
            let durable_put = scope.spawn(move || durable.put(durable_key, durable_value));

            self.fast.put(key, value);

            match durable_put.join() {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(lanestore::Error::Unavailable(
                    "durable write panicked".to_string(),
                )
                .into()),
            }
        })
    }
}
