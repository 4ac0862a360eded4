//! Coordination primitives
//!
//! - **[`single_flight`]**: per-key async mutex so that at most one task
//!   performs an expensive construction for a given key at a time

pub mod single_flight;

pub use single_flight::{KeyedGuard, KeyedMutex};
