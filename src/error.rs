//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror. Only construction-time
//! failures surface as errors; per-operation I/O problems are logged and
//! degrade to cache misses inside the backends.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Size string could not be parsed
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// Factory was asked for a backend it does not know
    #[error("Unsupported storage type: {0}")]
    UnsupportedStorageType(String),

    /// Filesystem failure while setting up or loading a backend
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// On-disk index could not be decoded
    #[error("Corrupt cache index: {0}")]
    Index(#[from] serde_json::Error),
}

impl CacheError {
    /// Wraps an I/O error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CacheError::Io {
            context: context.into(),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
