//! Backend Factory
//!
//! Picks and builds a [`Storage`] implementation from configuration.

use tracing::info;

use crate::cache::{FileStorage, MemoryStorage, Storage};
use crate::config::StorageConfig;
use crate::error::{CacheError, Result};

/// Builds the backend selected by `config.storage_type`.
///
/// - `"file"` / `"persistent"`: [`FileStorage`] rooted at `cache_dir`
/// - `"memory"` / `""`: [`MemoryStorage`]
///
/// # Errors
/// Unknown storage types and backend construction failures (for example an
/// uncreatable cache directory) are returned to the caller, who is expected to
/// abort startup.
pub fn new_storage(config: &StorageConfig) -> Result<Box<dyn Storage>> {
    match config.storage_type.as_str() {
        "file" | "persistent" => {
            let storage = FileStorage::from_config(config)?;
            if config.persistent {
                info!(
                    "Cache initialized: type={}, persistent=true, dir={}",
                    config.storage_type,
                    config.cache_dir.display()
                );
            } else {
                info!(
                    "Cache initialized: type={}, ttl={}s, dir={}",
                    config.storage_type,
                    config.default_ttl,
                    config.cache_dir.display()
                );
            }
            Ok(Box::new(storage))
        }
        "memory" | "" => {
            let storage = MemoryStorage::from_config(config)?;
            info!("Cache initialized: type=memory, ttl={}s", config.default_ttl);
            Ok(Box::new(storage))
        }
        other => Err(CacheError::UnsupportedStorageType(other.to_string())),
    }
}
