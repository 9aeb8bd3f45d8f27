//! In-Memory Backend
//!
//! Process-local cache: a digest-keyed map behind one `RwLock`, bounded by
//! total payload bytes, with a background expiration sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, info};

use crate::cache::digest::key_digest;
use crate::cache::size::parse_size_or;
use crate::cache::{
    CacheCounters, CacheEntry, Headers, Storage, StorageStats, DEFAULT_CLEANUP_INTERVAL,
    DEFAULT_MEMORY_MAX_SIZE, DEFAULT_TTL,
};
use crate::config::StorageConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, SweepHandle};

// == Memory State ==
/// Entries and size accounting guarded by the backend's lock.
#[derive(Debug)]
pub struct MemoryState {
    /// Entries by key digest
    entries: HashMap<String, CacheEntry>,
    /// Sum of entry sizes
    current_size: u64,
    /// Size bound in bytes
    max_size: u64,
}

impl MemoryState {
    pub fn new(max_size: u64) -> Self {
        Self {
            entries: HashMap::new(),
            current_size: 0,
            max_size,
        }
    }

    // == Insert ==
    /// Inserts `entry`, replacing any entry with the same digest.
    ///
    /// Evicts by earliest expiry until the entry fits. Returns the number of
    /// evictions, or None when the entry alone exceeds the bound and was not
    /// stored.
    pub fn insert(&mut self, entry: CacheEntry) -> Option<usize> {
        self.remove(&entry.digest);

        if entry.size > self.max_size {
            return None;
        }

        let mut evicted = 0;
        while self.current_size + entry.size > self.max_size && self.evict_earliest_expiry() {
            evicted += 1;
        }

        self.current_size += entry.size;
        self.entries.insert(entry.digest.clone(), entry);
        Some(evicted)
    }

    pub fn get(&self, digest: &str) -> Option<&CacheEntry> {
        self.entries.get(digest)
    }

    /// Removes an entry and releases its size.
    pub fn remove(&mut self, digest: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(digest)?;
        self.current_size -= entry.size;
        Some(entry)
    }

    // == Eviction ==
    /// Removes the entry that expires first, regardless of access recency.
    fn evict_earliest_expiry(&mut self) -> bool {
        let victim = self
            .entries
            .values()
            .min_by_key(|entry| entry.expires_at.unwrap_or(DateTime::<Utc>::MAX_UTC))
            .map(|entry| entry.digest.clone());

        match victim {
            Some(digest) => {
                if let Some(entry) = self.remove(&digest) {
                    debug!("Evicted {} ({} bytes)", entry.key, entry.size);
                }
                true
            }
            None => false,
        }
    }

    // == Purge Expired ==
    /// Removes every entry expired at `now`.
    ///
    /// Returns the number of entries removed and the bytes freed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> (usize, u64) {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                freed += entry.size;
            }
            keep
        });
        self.current_size -= freed;
        (before - self.entries.len(), freed)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }
}

// == Memory Storage ==
/// In-memory [`Storage`] backend.
#[derive(Debug)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
    counters: Arc<CacheCounters>,
    default_ttl: Duration,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl MemoryStorage {
    // == Constructor ==
    /// Creates a memory backend and starts its expiration sweep.
    ///
    /// # Arguments
    /// * `max_size` - Size string; unparseable values fall back to 100MB
    /// * `default_ttl` - TTL for stores with a zero TTL; zero selects 300s
    /// * `cleanup_interval` - Sweep interval; zero selects 10 minutes
    pub fn new(max_size: &str, default_ttl: Duration, cleanup_interval: Duration) -> Result<Self> {
        let max_size = parse_size_or(max_size, DEFAULT_MEMORY_MAX_SIZE);
        let default_ttl = non_zero_or(default_ttl, DEFAULT_TTL);
        let cleanup_interval = non_zero_or(cleanup_interval, DEFAULT_CLEANUP_INTERVAL);

        let state = Arc::new(RwLock::new(MemoryState::new(max_size)));
        let counters = Arc::new(CacheCounters::new());
        let sweeper = spawn_sweep_task(state.clone(), counters.clone(), cleanup_interval)
            .map_err(|e| CacheError::io("failed to start expiration sweep", e))?;

        info!(
            "Memory cache initialized: max_size={} bytes, default_ttl={}s, cleanup_interval={}s",
            max_size,
            default_ttl.as_secs(),
            cleanup_interval.as_secs()
        );

        Ok(Self {
            state,
            counters,
            default_ttl,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// Creates a memory backend from the relevant fields of `config`.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(
            &config.max_size,
            Duration::from_secs(config.default_ttl),
            Duration::from_secs(config.cleanup_interval),
        )
    }

    /// Runs one expiration pass immediately. Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let (removed, _) = self.state.write().purge_expired(Utc::now());
        self.counters.record_expirations(removed as u64);
        removed
    }
}

fn non_zero_or(value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        default
    } else {
        value
    }
}

impl Storage for MemoryStorage {
    fn store_with_metadata(
        &self,
        key: &str,
        payload: &[u8],
        headers: &Headers,
        status_code: u16,
        ttl: Duration,
    ) {
        let ttl = non_zero_or(ttl, self.default_ttl);
        let entry = CacheEntry::new(key, payload, headers, status_code, Some(ttl));
        let size = entry.size;

        match self.state.write().insert(entry) {
            Some(evicted) => self.counters.record_evictions(evicted as u64),
            None => debug!("Skipping cache write for {}: {} bytes exceeds max size", key, size),
        }
    }

    fn fetch_item(&self, key: &str) -> Option<CacheEntry> {
        let digest = key_digest(key);
        let state = self.state.upgradable_read();

        match state.get(&digest) {
            None => {
                self.counters.record_miss();
                return None;
            }
            Some(entry) if !entry.is_expired() => {
                self.counters.record_hit();
                return Some(entry.clone());
            }
            Some(_) => {}
        }

        // Expired: purge under the write lock before reporting the miss.
        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        if state.remove(&digest).is_some() {
            debug!("Lazily expired {}", key);
            self.counters.record_expirations(1);
        }
        self.counters.record_miss();
        None
    }

    fn delete(&self, key: &str) {
        self.state.write().remove(&key_digest(key));
    }

    fn clear(&self) {
        self.state.write().clear();
    }

    fn stats(&self) -> StorageStats {
        let state = self.state.read();
        StorageStats::new(
            "memory",
            state.len(),
            state.current_size(),
            state.max_size(),
            &self.counters,
        )
    }

    fn stop(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.shutdown();
        }
    }
}

impl Drop for MemoryStorage {
    fn drop(&mut self) {
        self.stop();
    }
}
