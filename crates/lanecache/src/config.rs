//! Cache configuration

use std::time::Duration;

use crate::error::{Error, Result};

/// Default number of shard lanes
pub const DEFAULT_SHARDS: usize = 10;

/// Default time `shutdown` waits for lanes to drain
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default time a writer waits for an eviction victim to become available
pub const DEFAULT_VICTIM_WAIT: Duration = Duration::from_secs(1);

/// Configuration for a [`ShardedCache`](crate::ShardedCache)
///
/// ```
/// use std::time::Duration;
/// use lanecache::CacheConfig;
///
/// let config = CacheConfig::new(1_000)
///     .with_shards(16)
///     .with_shutdown_grace(Duration::from_secs(2));
/// assert_eq!(config.capacity(), 1_000);
/// assert_eq!(config.shards(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    capacity: usize,
    shards: usize,
    shutdown_grace: Duration,
    victim_wait: Duration,
}

impl CacheConfig {
    /// Config for a cache holding at most `capacity` keys
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            shards: DEFAULT_SHARDS,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            victim_wait: DEFAULT_VICTIM_WAIT,
        }
    }

    /// Set the number of lanes
    #[must_use]
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Set how long shutdown waits for queued work
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set how long a writer at capacity waits for an in-flight write to
    /// become evictable
    #[must_use]
    pub fn with_victim_wait(mut self, wait: Duration) -> Self {
        self.victim_wait = wait;
        self
    }

    /// Maximum number of resident keys
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of lanes
    pub fn shards(&self) -> usize {
        self.shards
    }

    /// Shutdown drain deadline
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    /// Victim wait bound
    pub fn victim_wait(&self) -> Duration {
        self.victim_wait
    }

    /// Reject zero capacity or zero lanes
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidCapacity(self.capacity));
        }
        if self.shards == 0 {
            return Err(Error::InvalidShardCount(self.shards));
        }
        Ok(())
    }
}
