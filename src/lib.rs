//! Proxy Cache - response cache storage for a reverse proxy
//!
//! Stores response bodies with their status code and a few replayable headers,
//! keyed by request identity, in memory or on disk.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{new_storage, request_key, CacheEntry, Headers, Storage, StorageStats};
pub use config::StorageConfig;
pub use error::{CacheError, Result};
