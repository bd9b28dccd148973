//! Error types for lanecache

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache operations
#[derive(Debug, Error)]
pub enum Error {
    /// Capacity must be at least one entry
    #[error("invalid capacity: {0} (must be > 0)")]
    InvalidCapacity(usize),

    /// Shard count must be at least one lane
    #[error("invalid shard count: {0} (must be > 0)")]
    InvalidShardCount(usize),

    /// A lane worker thread could not be started
    #[error("failed to spawn lane {shard}")]
    LaneSpawn {
        /// Lane index
        shard: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The durable half of a write-through failed; the write did not happen
    #[error("write-through failed: {0}")]
    WriteFailed(#[from] lanestore::Error),

    /// A task panicked on its lane
    #[error("task panicked on lane {shard}")]
    TaskPanicked {
        /// Lane index
        shard: usize,
    },

    /// The cache has been shut down
    #[error("cache is shut down")]
    ShutDown,

    /// Some lanes were still busy when the shutdown grace period ran out
    #[error("{lanes} lane(s) did not drain before the shutdown deadline")]
    ShutdownTimedOut {
        /// Number of lanes left running
        lanes: usize,
    },
}
