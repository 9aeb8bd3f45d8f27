//! Background Tasks Module
//!
//! Contains background work that runs alongside the cache.
//!
//! # Tasks
//! - Expiration sweep: removes expired in-memory entries at a fixed interval

mod sweep;

pub use sweep::{spawn_sweep_task, SweepHandle};
