//! Storage Contract
//!
//! The narrow interface a proxy layer uses to talk to either backend.

use std::time::Duration;

use crate::cache::{CacheEntry, Headers, StorageStats};

/// Status recorded by [`Storage::store`].
pub const DEFAULT_STATUS_CODE: u16 = 200;

/// Operations every cache backend provides.
///
/// All methods are synchronous and infallible from the caller's point of view:
/// I/O trouble inside a backend degrades to a skipped write or a miss.
pub trait Storage: Send + Sync {
    /// Stores `payload` with no headers and status 200.
    fn store(&self, key: &str, payload: &[u8], ttl: Duration) {
        self.store_with_metadata(key, payload, &Headers::new(), DEFAULT_STATUS_CODE, ttl);
    }

    /// Inserts or replaces the entry for `key`.
    ///
    /// A zero `ttl` selects the backend's default TTL. Headers outside the
    /// cacheable allow-list are dropped.
    fn store_with_metadata(
        &self,
        key: &str,
        payload: &[u8],
        headers: &Headers,
        status_code: u16,
        ttl: Duration,
    );

    /// Returns only the payload of a live entry.
    fn fetch(&self, key: &str) -> Option<Vec<u8>> {
        self.fetch_item(key).map(|entry| entry.payload)
    }

    /// Returns the full entry for `key`, purging it first if it has expired.
    fn fetch_item(&self, key: &str) -> Option<CacheEntry>;

    /// Removes the entry for `key`; absent keys are ignored.
    fn delete(&self, key: &str);

    /// Removes every entry and resets size accounting.
    fn clear(&self);

    /// Point-in-time usage snapshot.
    fn stats(&self) -> StorageStats;

    /// Releases background resources and flushes durable state. Safe to call twice.
    fn stop(&self);
}
