//! # lanestore
//!
//! The durable side of a write-through cache.
//!
//! ## Contents
//! - [`DurableStore`]: the get/put/delete contract the cache consumes
//! - [`SimulatedStore`]: in-memory implementation with per-write latency and
//!   a failure switch, for demos and tests
//! - [`Error`] / [`Result`]: store failures surfaced to the cache

#![warn(missing_docs)]

mod error;
mod simulated;
mod store;

pub use error::{Error, Result};
pub use simulated::{SimulatedStore, DEFAULT_WRITE_LATENCY};
pub use store::DurableStore;
