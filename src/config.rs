//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables
//! or from a host application's own config file (via serde).

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Cache storage configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Hosts embedding the cache in a YAML/JSON config can deserialize this directly;
/// missing fields fall back to [`StorageConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selector: "memory" (or empty), "file" or "persistent"
    pub storage_type: String,
    /// Root directory for the file backend
    pub cache_dir: PathBuf,
    /// Human-readable size bound, e.g. "100MB"
    pub max_size: String,
    /// Default TTL in seconds for entries stored with a zero TTL
    pub default_ttl: u64,
    /// Expiration sweep interval in seconds (memory backend)
    pub cleanup_interval: u64,
    /// File backend only: entries never expire
    pub persistent: bool,
}

impl StorageConfig {
    /// Creates a new StorageConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_STORAGE_TYPE` - Backend type (default: memory)
    /// - `CACHE_DIR` - File backend directory (default: ./cache)
    /// - `CACHE_MAX_SIZE` - Size bound (default: 100MB)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 600)
    /// - `CACHE_PERSISTENT` - "true"/"1" to never expire file entries (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            storage_type: env::var("CACHE_STORAGE_TYPE").unwrap_or(defaults.storage_type),
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            max_size: env::var("CACHE_MAX_SIZE").unwrap_or(defaults.max_size),
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            cleanup_interval: env::var("CACHE_CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cleanup_interval),
            persistent: env::var("CACHE_PERSISTENT")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.persistent),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "memory".to_string(),
            cache_dir: PathBuf::from("./cache"),
            max_size: "100MB".to_string(),
            default_ttl: 300,
            cleanup_interval: 600,
            persistent: false,
        }
    }
}
