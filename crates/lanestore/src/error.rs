//! Error types for lanestore

use thiserror::Error;

/// Result type alias for durable store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a durable store can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The store could not complete the operation (outage, I/O failure)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store has been closed
    #[error("store is closed")]
    Closed,
}
