//! Cache Statistics Module
//!
//! Point-in-time snapshots of backend usage plus running hit/miss/eviction
//! counters shared by both backends.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Storage Stats ==
/// Snapshot returned by [`Storage::stats`](crate::cache::Storage::stats).
///
/// Serializes to the flat JSON object admin tooling expects; the file-only
/// fields are omitted for the memory backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStats {
    /// Number of stored entries (may include expired ones not yet reclaimed)
    pub items_count: usize,
    /// Bytes currently accounted
    pub current_size: u64,
    /// Configured size bound in bytes
    pub max_size: u64,
    /// current_size / max_size * 100
    pub usage_percent: f64,
    /// "memory" or "file"
    pub storage_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    /// Successful fetches
    pub hits: u64,
    /// Fetches that found nothing live
    pub misses: u64,
    /// Entries removed to satisfy the size bound
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl StorageStats {
    /// Builds the common part of a snapshot.
    pub fn new(
        storage_type: &str,
        items_count: usize,
        current_size: u64,
        max_size: u64,
        counters: &CacheCounters,
    ) -> Self {
        let (hits, misses, evictions, expirations) = counters.snapshot();
        Self {
            items_count,
            current_size,
            max_size,
            usage_percent: usage_percent(current_size, max_size),
            storage_type: storage_type.to_string(),
            persistent: None,
            cache_dir: None,
            hits,
            misses,
            evictions,
            expirations,
            hit_rate: hit_rate(hits, misses),
        }
    }
}

fn usage_percent(current: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        current as f64 / max as f64 * 100.0
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

// == Cache Counters ==
/// Lock-free operation counters, updated alongside the guarded state.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns (hits, misses, evictions, expirations).
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.evictions.load(Ordering::Relaxed),
            self.expirations.load(Ordering::Relaxed),
        )
    }
}
