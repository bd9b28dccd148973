//! In-memory durable store with simulated write latency
//!
//! Every `put` sleeps for the configured latency before it is applied,
//! modelling the round trip to a real database. Reads and deletes apply
//! immediately.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ahash::RandomState;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::{Error, Result};
use crate::store::DurableStore;

/// Default latency applied to every write (50 ms)
pub const DEFAULT_WRITE_LATENCY: Duration = Duration::from_millis(50);

/// SimulatedStore stands in for a remote database
pub struct SimulatedStore<K, V> {
    /// Stored rows
    rows: RwLock<HashMap<K, V, RandomState>>,

    /// Sleep applied before each write
    latency: Duration,

    /// When set, writes fail with [`Error::Unavailable`]
    failing: AtomicBool,

    /// Is the store closed?
    closed: AtomicBool,
}

impl<K, V> SimulatedStore<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create a store with [`DEFAULT_WRITE_LATENCY`]
    pub fn new() -> Self {
        Self::with_latency(DEFAULT_WRITE_LATENCY)
    }

    /// Create a store whose writes take `latency`
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            rows: RwLock::new(HashMap::with_hasher(RandomState::new())),
            latency,
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Configured write latency
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Close the store; every later operation returns [`Error::Closed`]
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl<K, V> Default for SimulatedStore<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> DurableStore<K, V> for SimulatedStore<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Result<Option<V>> {
        self.check_open()?;
        Ok(self.rows.read().get(key).cloned())
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        self.check_open()?;

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("simulated write failure".to_string()));
        }

        self.rows.write().insert(key, value);
        trace!(latency_ms = self.latency.as_millis() as u64, "durable put applied");
        Ok(())
    }

    fn delete(&self, key: &K) -> Result<()> {
        self.check_open()?;
        self.rows.write().remove(key);
        Ok(())
    }
}
