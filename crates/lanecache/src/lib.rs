//! # lanecache
//!
//! Sharded write-through cache with bounded capacity and LRU eviction.
//!
//! ## Architecture
//! - **Lanes**: one worker thread per shard; a key always runs on the lane
//!   picked by its hash, so same-key operations keep their order
//! - **FastStore**: in-memory map holding the cached values
//! - **LRU policy**: arena-backed recency list + index, one lock
//! - **Write-through**: fast store and durable store written concurrently,
//!   acknowledged when both finish
//! - **Capacity lock**: admits keys and decides evictions; never held across I/O
//!
//! ```
//! use std::time::Duration;
//! use lanecache::{CacheConfig, ShardedCache};
//! use lanestore::SimulatedStore;
//!
//! let store = SimulatedStore::with_latency(Duration::from_millis(1));
//! let cache = ShardedCache::new(CacheConfig::new(100).with_shards(4), store).unwrap();
//!
//! cache.write("user1".to_string(), "Alice".to_string()).unwrap();
//! assert_eq!(cache.read(&"user1".to_string()).unwrap(), Some("Alice".to_string()));
//! cache.shutdown().unwrap();
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod fast;
mod lane;
mod list;
mod lru;
mod stats;
mod write_through;

pub use cache::ShardedCache;
pub use config::{CacheConfig, DEFAULT_SHARDS, DEFAULT_SHUTDOWN_GRACE, DEFAULT_VICTIM_WAIT};
pub use error::{Error, Result};
pub use fast::FastStore;
pub use lru::LruEvictionPolicy;
pub use stats::CacheStats;
pub use write_through::WriteThrough;
