//! Cache Module
//!
//! Response cache storage: a shared contract, an in-memory backend with a
//! background sweep, and a persistent file backend.

mod digest;
mod entry;
mod factory;
mod file;
mod headers;
mod key;
mod memory;
mod size;
mod stats;
mod storage;


use std::time::Duration;

// Re-export public types
pub use digest::{key_digest, DIGEST_LEN};
pub use entry::CacheEntry;
pub use factory::new_storage;
pub use file::{data_file_name, FileStorage, IndexRecord, DATA_DIR, INDEX_FILE};
pub use headers::{canonical_name, retain_cacheable, Headers, CACHEABLE_HEADERS};
pub use key::request_key;
pub use memory::{MemoryState, MemoryStorage};
pub use size::{parse_size, parse_size_or};
pub use stats::{CacheCounters, StorageStats};
pub use storage::{Storage, DEFAULT_STATUS_CODE};

// == Public Constants ==
/// Memory backend size bound when the configured size is invalid
pub const DEFAULT_MEMORY_MAX_SIZE: u64 = 100 * 1024 * 1024; // 100 MB

/// File backend size bound when the configured size is invalid
pub const DEFAULT_FILE_MAX_SIZE: u64 = 500 * 1024 * 1024; // 500 MB

/// TTL used when neither the store call nor the config provides one
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Expiration sweep interval when the config provides none
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);
