//! The durable store contract

use crate::error::Result;

/// Key-value service backing the cache.
///
/// Implementations may be slow (network or disk bound). Callers treat the
/// latency as opaque and never retry; any retry policy belongs to the
/// implementation itself.
pub trait DurableStore<K, V>: Send + Sync {
    /// Fetch the value stored under `key`, if any
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Insert or replace the value stored under `key`
    fn put(&self, key: K, value: V) -> Result<()>;

    /// Remove `key`; removing an absent key succeeds
    fn delete(&self, key: &K) -> Result<()>;
}

impl<K, V, S> DurableStore<K, V> for std::sync::Arc<S>
where
    S: DurableStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Result<Option<V>> {
        (**self).get(key)
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &K) -> Result<()> {
        (**self).delete(key)
    }
}
