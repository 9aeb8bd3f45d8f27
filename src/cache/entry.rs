//! Cache Entry Module
//!
//! Defines the structure for individual cached responses with TTL support.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::digest::key_digest;
use crate::cache::headers::{retain_cacheable, Headers};

// == Cache Entry ==
/// A cached response: payload bytes plus replayable metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Caller-supplied identity string
    pub key: String,
    /// Storage index derived from `key`
    pub digest: String,
    /// Response body
    pub payload: Vec<u8>,
    /// Allow-listed response headers
    pub headers: Headers,
    /// HTTP status the payload was served with
    pub status_code: u16,
    /// Insertion time
    pub created_at: DateTime<Utc>,
    /// Expiration time, None = never expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Payload length in bytes
    pub size: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry, copying `payload` and filtering `headers`.
    ///
    /// # Arguments
    /// * `key` - Original cache key
    /// * `payload` - Response body (copied, never aliased)
    /// * `headers` - Response headers; non-cacheable ones are dropped
    /// * `status_code` - HTTP status
    /// * `ttl` - Lifetime, None = never expires
    pub fn new(
        key: &str,
        payload: &[u8],
        headers: &Headers,
        status_code: u16,
        ttl: Option<Duration>,
    ) -> Self {
        let now = Utc::now();
        Self {
            key: key.to_string(),
            digest: key_digest(key),
            payload: payload.to_vec(),
            headers: retain_cacheable(headers),
            status_code,
            created_at: now,
            expires_at: ttl.map(|ttl| expiry_after(now, ttl)),
            size: payload.len() as u64,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time. Entries without an expiration never expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Same as [`is_expired`](Self::is_expired) against a fixed instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_past(self.expires_at, now)
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if the entry never expires.
    ///
    /// Returns `Some(Duration::ZERO)` once expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| (expires - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }
}

// == Utility Functions ==
/// Returns `now + ttl`, saturating at the latest representable instant.
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// True when `expires_at` is set and `now` has reached it.
pub fn is_past(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expires) => now >= expires,
        None => false,
    }
}
