//! Persistent File Backend
//!
//! Keeps payloads as one file per entry under `data/` and the metadata for
//! all entries in a JSON index next to it. The index is loaded and reconciled
//! against the data directory at startup and rewritten after every mutation.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::digest::key_digest;
use crate::cache::entry::{expiry_after, is_past};
use crate::cache::headers::retain_cacheable;
use crate::cache::size::parse_size_or;
use crate::cache::{
    CacheCounters, CacheEntry, Headers, Storage, StorageStats, DEFAULT_FILE_MAX_SIZE, DEFAULT_TTL,
};
use crate::config::StorageConfig;
use crate::error::{CacheError, Result};

/// Index file name inside the cache directory.
pub const INDEX_FILE: &str = "index.json";
/// Payload directory name inside the cache directory.
pub const DATA_DIR: &str = "data";

// == Index Record ==
/// Metadata persisted for one entry; the payload lives in `data_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub key: String,
    #[serde(default)]
    pub headers: Headers,
    pub status_code: u16,
    pub created_at: DateTime<Utc>,
    /// None = never expires
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub size: u64,
    pub data_file: String,
}

impl IndexRecord {
    fn into_entry(self, digest: String, payload: Vec<u8>) -> CacheEntry {
        CacheEntry {
            key: self.key,
            digest,
            payload,
            headers: self.headers,
            status_code: self.status_code,
            created_at: self.created_at,
            expires_at: self.expires_at,
            size: self.size,
        }
    }
}

/// Data file name for a digest.
pub fn data_file_name(digest: &str) -> String {
    format!("{}.bin", digest)
}

#[derive(Debug, Default)]
struct FileState {
    records: HashMap<String, IndexRecord>,
    current_size: u64,
}

// == File Storage ==
/// Disk-backed [`Storage`] backend.
#[derive(Debug)]
pub struct FileStorage {
    cache_dir: PathBuf,
    data_dir: PathBuf,
    index_path: PathBuf,
    state: Mutex<FileState>,
    counters: CacheCounters,
    max_size: u64,
    default_ttl: Duration,
    persistent: bool,
}

impl FileStorage {
    // == Constructor ==
    /// Opens (or creates) a file cache rooted at `cache_dir`.
    ///
    /// # Arguments
    /// * `cache_dir` - Root directory; created with its `data/` subdirectory if missing
    /// * `max_size` - Size string; unparseable values fall back to 500MB
    /// * `default_ttl` - TTL for stores with a zero TTL; zero selects 300s
    /// * `persistent` - When true, entries never expire
    ///
    /// # Errors
    /// Fails if the directories cannot be created or an existing index cannot
    /// be read or decoded.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        max_size: &str,
        default_ttl: Duration,
        persistent: bool,
    ) -> Result<Self> {
        let cache_dir = cache_dir.into();
        let data_dir = cache_dir.join(DATA_DIR);
        fs::create_dir_all(&data_dir).map_err(|e| {
            CacheError::io(
                format!("failed to create cache directory {}", data_dir.display()),
                e,
            )
        })?;

        let storage = Self {
            index_path: cache_dir.join(INDEX_FILE),
            cache_dir,
            data_dir,
            state: Mutex::new(FileState::default()),
            counters: CacheCounters::new(),
            max_size: parse_size_or(max_size, DEFAULT_FILE_MAX_SIZE),
            default_ttl: if default_ttl.is_zero() {
                DEFAULT_TTL
            } else {
                default_ttl
            },
            persistent,
        };
        storage.load_index()?;

        Ok(storage)
    }

    /// Opens a file cache from the relevant fields of `config`.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(
            &config.cache_dir,
            &config.max_size,
            Duration::from_secs(config.default_ttl),
            config.persistent,
        )
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn data_path(&self, data_file: &str) -> PathBuf {
        self.data_dir.join(data_file)
    }

    // == Startup Reconciliation ==
    fn load_index(&self) -> Result<()> {
        let records: HashMap<String, IndexRecord> = match fs::read(&self.index_path) {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No cache index at {}, starting empty", self.index_path.display());
                HashMap::new()
            }
            Err(e) => return Err(CacheError::io("failed to read cache index", e)),
        };

        let now = Utc::now();
        let total = records.len();
        let mut state = self.state.lock();
        for (digest, record) in records {
            if record.data_file != data_file_name(&digest) {
                warn!("Dropping index record {} with unexpected data file", digest);
                continue;
            }

            let path = self.data_path(&record.data_file);
            if !path.is_file() {
                debug!("Dropping index record for {}: data file missing", record.key);
                continue;
            }

            if !self.persistent && is_past(record.expires_at, now) {
                remove_data_file(&path);
                continue;
            }

            state.current_size += record.size;
            state.records.insert(digest, record);
        }

        let orphans = self.remove_orphans(&state);

        info!(
            "Loaded cache index from {}: {} entries, {} bytes ({} dropped, {} orphans removed)",
            self.cache_dir.display(),
            state.records.len(),
            state.current_size,
            total - state.records.len(),
            orphans
        );

        if state.records.len() != total {
            self.save_index(&state);
        }
        Ok(())
    }

    /// Deletes files under `data/` that no live record references, plus any
    /// temp file left behind by an interrupted index write.
    fn remove_orphans(&self, state: &FileState) -> usize {
        let mut temp_index = self.index_path.as_os_str().to_owned();
        temp_index.push(".tmp");
        remove_data_file(Path::new(&temp_index));

        let live: HashSet<&str> = state
            .records
            .values()
            .map(|record| record.data_file.as_str())
            .collect();

        let files = match fs::read_dir(&self.data_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list {}: {}", self.data_dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for file in files.flatten() {
            let name = file.file_name();
            if !live.contains(name.to_string_lossy().as_ref()) {
                debug!("Removing orphaned cache file {}", file.path().display());
                remove_data_file(&file.path());
                removed += 1;
            }
        }
        removed
    }

    // == Index Persistence ==
    /// Rewrites the whole index. Failures are logged; the in-memory view stays authoritative.
    fn save_index(&self, state: &FileState) {
        let result = serde_json::to_vec_pretty(&state.records)
            .map_err(std::io::Error::from)
            .and_then(|bytes| write_atomic(&self.index_path, &bytes));

        if let Err(e) = result {
            warn!("Failed to write cache index {}: {}", self.index_path.display(), e);
        }
    }

    /// Drops a record and its data file, releasing its size.
    fn remove_record(&self, state: &mut FileState, digest: &str) -> Option<IndexRecord> {
        let record = state.records.remove(digest)?;
        remove_data_file(&self.data_path(&record.data_file));
        state.current_size -= record.size;
        Some(record)
    }

    // == Eviction ==
    /// Removes the entry created first.
    fn evict_oldest(&self, state: &mut FileState) -> bool {
        let victim = state
            .records
            .iter()
            .min_by_key(|(_, record)| record.created_at)
            .map(|(digest, _)| digest.clone());

        match victim.and_then(|digest| self.remove_record(state, &digest)) {
            Some(record) => {
                debug!("Evicted {} ({} bytes)", record.key, record.size);
                true
            }
            None => false,
        }
    }
}

impl Storage for FileStorage {
    fn store_with_metadata(
        &self,
        key: &str,
        payload: &[u8],
        headers: &Headers,
        status_code: u16,
        ttl: Duration,
    ) {
        let digest = key_digest(key);
        let size = payload.len() as u64;
        let mut state = self.state.lock();

        let mut dirty = self.remove_record(&mut state, &digest).is_some();

        if size > self.max_size {
            debug!("Skipping cache write for {}: {} bytes exceeds max size", key, size);
            if dirty {
                self.save_index(&state);
            }
            return;
        }

        let mut evicted = 0;
        while state.current_size + size > self.max_size && self.evict_oldest(&mut state) {
            evicted += 1;
        }
        self.counters.record_evictions(evicted);
        dirty |= evicted > 0;

        let data_file = data_file_name(&digest);
        if let Err(e) = write_atomic(&self.data_path(&data_file), payload) {
            warn!("Failed to write cache data for {}: {}", key, e);
            if dirty {
                self.save_index(&state);
            }
            return;
        }

        let now = Utc::now();
        let expires_at = if self.persistent {
            None
        } else {
            let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
            Some(expiry_after(now, ttl))
        };

        state.records.insert(
            digest,
            IndexRecord {
                key: key.to_string(),
                headers: retain_cacheable(headers),
                status_code,
                created_at: now,
                expires_at,
                size,
                data_file,
            },
        );
        state.current_size += size;
        self.save_index(&state);
    }

    fn fetch_item(&self, key: &str) -> Option<CacheEntry> {
        let digest = key_digest(key);
        let mut state = self.state.lock();

        let Some(record) = state.records.get(&digest).cloned() else {
            self.counters.record_miss();
            return None;
        };

        if !self.persistent && is_past(record.expires_at, Utc::now()) {
            debug!("Lazily expired {}", key);
            self.remove_record(&mut state, &digest);
            self.save_index(&state);
            self.counters.record_expirations(1);
            self.counters.record_miss();
            return None;
        }

        let payload = match fs::read(self.data_path(&record.data_file)) {
            Ok(payload) if payload.len() as u64 == record.size => payload,
            Ok(payload) => {
                warn!(
                    "Cache data for {} is {} bytes, index says {}; dropping entry",
                    key,
                    payload.len(),
                    record.size
                );
                self.remove_record(&mut state, &digest);
                self.save_index(&state);
                self.counters.record_miss();
                return None;
            }
            Err(e) => {
                warn!("Failed to read cache data for {}: {}; dropping entry", key, e);
                self.remove_record(&mut state, &digest);
                self.save_index(&state);
                self.counters.record_miss();
                return None;
            }
        };

        self.counters.record_hit();
        Some(record.into_entry(digest, payload))
    }

    fn delete(&self, key: &str) {
        let mut state = self.state.lock();
        if self.remove_record(&mut state, &key_digest(key)).is_some() {
            self.save_index(&state);
        }
    }

    fn clear(&self) {
        let mut state = self.state.lock();

        match fs::read_dir(&self.data_dir) {
            Ok(files) => {
                for file in files.flatten() {
                    remove_data_file(&file.path());
                }
            }
            Err(e) => warn!("Failed to list {}: {}", self.data_dir.display(), e),
        }

        state.records.clear();
        state.current_size = 0;
        self.save_index(&state);
    }

    fn stats(&self) -> StorageStats {
        let state = self.state.lock();
        let mut stats = StorageStats::new(
            "file",
            state.records.len(),
            state.current_size,
            self.max_size,
            &self.counters,
        );
        stats.persistent = Some(self.persistent);
        stats.cache_dir = Some(self.cache_dir.display().to_string());
        stats
    }

    fn stop(&self) {
        let state = self.state.lock();
        self.save_index(&state);
    }
}

// == Filesystem Helpers ==
fn remove_data_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Writes `content` to a sibling temp file and renames it over `path`.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let result = fs::File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp_path, path));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use tempfile::TempDir;

    fn open(dir: &TempDir, max_size: &str, persistent: bool) -> FileStorage {
        FileStorage::new(dir.path(), max_size, Duration::from_secs(300), persistent).unwrap()
    }

    fn read_index(dir: &TempDir) -> HashMap<String, IndexRecord> {
        let raw = fs::read(dir.path().join(INDEX_FILE)).unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[test]
    fn test_new_creates_layout() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested/cache");

        let cache = FileStorage::new(&root, "1MB", Duration::ZERO, false).unwrap();

        assert!(root.join(DATA_DIR).is_dir());
        assert_eq!(cache.cache_dir(), root.as_path());
        assert_eq!(cache.stats().items_count, 0);
    }

    #[test]
    fn test_store_writes_data_file_and_index() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);

        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "text/html".to_string());
        headers.insert("Server".to_string(), "nginx".to_string());
        cache.store_with_metadata("a.com:GET:/x", b"hello", &headers, 200, Duration::ZERO);

        let digest = key_digest("a.com:GET:/x");
        let data = fs::read(dir.path().join(DATA_DIR).join(data_file_name(&digest))).unwrap();
        assert_eq!(data, b"hello");

        let index = read_index(&dir);
        let record = &index[&digest];
        assert_eq!(record.key, "a.com:GET:/x");
        assert_eq!(record.size, 5);
        assert_eq!(record.headers.len(), 1);
        assert!(record.expires_at.is_some());
    }

    #[test]
    fn test_fetch_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);

        let mut headers = Headers::new();
        headers.insert("ETag".to_string(), "\"v1\"".to_string());
        cache.store_with_metadata("key", b"body", &headers, 203, Duration::from_secs(60));

        let entry = cache.fetch_item("key").unwrap();
        assert_eq!(entry.payload, b"body");
        assert_eq!(entry.status_code, 203);
        assert_eq!(entry.headers["ETag"], "\"v1\"");
        assert_eq!(entry.digest, key_digest("key"));
        assert_eq!(cache.fetch("key").unwrap(), b"body");
        assert!(cache.fetch("other").is_none());
    }

    #[test]
    fn test_overwrite_replaces_data() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);

        cache.store("key", b"0123456789", Duration::ZERO);
        cache.store("key", b"abc", Duration::ZERO);

        assert_eq!(cache.fetch("key").unwrap(), b"abc");
        let stats = cache.stats();
        assert_eq!(stats.items_count, 1);
        assert_eq!(stats.current_size, 3);
    }

    #[test]
    fn test_expired_entry_is_purged_on_read() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);

        cache.store("key", b"value", Duration::from_millis(50));
        sleep(Duration::from_millis(80));

        assert!(cache.fetch_item("key").is_none());
        assert_eq!(cache.stats().current_size, 0);
        assert!(read_index(&dir).is_empty());
        let data = dir.path().join(DATA_DIR).join(data_file_name(&key_digest("key")));
        assert!(!data.exists());
    }

    #[test]
    fn test_persistent_mode_ignores_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", true);

        cache.store("key", b"value", Duration::from_millis(10));
        sleep(Duration::from_millis(30));

        let entry = cache.fetch_item("key").unwrap();
        assert!(entry.expires_at.is_none());
    }

    #[test]
    fn test_missing_data_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);

        cache.store("key", b"value", Duration::ZERO);
        let path = dir.path().join(DATA_DIR).join(data_file_name(&key_digest("key")));
        fs::remove_file(path).unwrap();

        assert!(cache.fetch_item("key").is_none());
        let stats = cache.stats();
        assert_eq!(stats.items_count, 0);
        assert_eq!(stats.current_size, 0);
    }

    #[test]
    fn test_truncated_data_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);

        cache.store("key", b"value", Duration::ZERO);
        let path = dir.path().join(DATA_DIR).join(data_file_name(&key_digest("key")));
        fs::write(path, b"va").unwrap();

        assert!(cache.fetch_item("key").is_none());
        assert_eq!(cache.stats().items_count, 0);
    }

    #[test]
    fn test_eviction_is_fifo() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "10", false);

        // The first entry expires last, so an expiry-based policy would keep it
        cache.store("first", b"aaaa", Duration::from_secs(600));
        sleep(Duration::from_millis(5));
        cache.store("second", b"bbbb", Duration::from_secs(60));
        sleep(Duration::from_millis(5));
        cache.store("third", b"cccc", Duration::from_secs(60));

        assert!(cache.fetch("first").is_none());
        assert!(cache.fetch("second").is_some());
        assert!(cache.fetch("third").is_some());
        let stats = cache.stats();
        assert_eq!(stats.current_size, 8);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_oversized_payload_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "8", false);

        cache.store("small", b"1234", Duration::ZERO);
        cache.store("huge", &[1u8; 9], Duration::ZERO);

        assert!(cache.fetch("huge").is_none());
        assert!(cache.fetch("small").is_some());
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);

        cache.store("key", b"value", Duration::ZERO);
        cache.delete("key");
        cache.delete("key");

        assert!(cache.fetch("key").is_none());
        assert!(read_index(&dir).is_empty());
        assert_eq!(cache.stats().current_size, 0);
    }

    #[test]
    fn test_clear_wipes_data_dir() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);

        for i in 0..5 {
            cache.store(&format!("key{}", i), b"value", Duration::ZERO);
        }
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.items_count, 0);
        assert_eq!(stats.current_size, 0);
        assert_eq!(fs::read_dir(dir.path().join(DATA_DIR)).unwrap().count(), 0);
        assert!(read_index(&dir).is_empty());
    }

    #[test]
    fn test_reload_reconciles_index() {
        let dir = TempDir::new().unwrap();
        {
            let cache = open(&dir, "1MB", false);
            cache.store("kept", b"12345", Duration::from_secs(600));
            cache.store("gone", b"12", Duration::from_secs(600));
            cache.store("stale", b"123", Duration::from_millis(20));
            cache.stop();
        }
        fs::remove_file(dir.path().join(DATA_DIR).join(data_file_name(&key_digest("gone"))))
            .unwrap();
        sleep(Duration::from_millis(40));

        let cache = open(&dir, "1MB", false);
        let stats = cache.stats();
        assert_eq!(stats.items_count, 1);
        assert_eq!(stats.current_size, 5);
        assert_eq!(cache.fetch("kept").unwrap(), b"12345");

        let stale = dir.path().join(DATA_DIR).join(data_file_name(&key_digest("stale")));
        assert!(!stale.exists(), "Expired data file should be deleted on load");
        assert_eq!(read_index(&dir).len(), 1);
    }

    #[test]
    fn test_corrupt_index_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(INDEX_FILE), b"{not json").unwrap();

        let result = FileStorage::new(dir.path(), "1MB", Duration::ZERO, false);
        assert!(matches!(result, Err(CacheError::Index(_))));
    }

    #[test]
    fn test_stats_reports_file_fields() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1KB", true);
        cache.store("key", b"12345678", Duration::ZERO);

        let stats = cache.stats();
        assert_eq!(stats.storage_type, "file");
        assert_eq!(stats.persistent, Some(true));
        assert_eq!(stats.cache_dir, Some(dir.path().display().to_string()));
        assert_eq!(stats.max_size, 1024);
        assert_eq!(stats.usage_percent, 8.0 / 1024.0 * 100.0);
    }

    #[test]
    fn test_invalid_max_size_falls_back() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "", false);
        assert_eq!(cache.stats().max_size, DEFAULT_FILE_MAX_SIZE);
    }

    #[test]
    fn test_payload_write_failure_fails_open() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);
        cache.store("keep", b"abc", Duration::ZERO);

        // A directory where the payload temp file must go makes the write fail
        let blocked = dir
            .path()
            .join(DATA_DIR)
            .join(format!("{}.tmp", data_file_name(&key_digest("new"))));
        fs::create_dir(&blocked).unwrap();

        cache.store("new", b"payload", Duration::ZERO);

        let stats = cache.stats();
        assert_eq!(stats.items_count, 1);
        assert_eq!(stats.current_size, 3);
        assert!(cache.fetch("new").is_none());
        assert!(!read_index(&dir).contains_key(&key_digest("new")));
        assert_eq!(cache.fetch("keep").unwrap(), b"abc");
    }

    #[test]
    fn test_index_write_failure_fails_open() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "1MB", false);

        // A directory where the index temp file must go makes the rewrite fail
        fs::create_dir(dir.path().join(format!("{}.tmp", INDEX_FILE))).unwrap();

        cache.store("key", b"value", Duration::ZERO);

        let entry = cache.fetch_item("key").unwrap();
        assert_eq!(entry.payload, b"value");
        assert_eq!(cache.stats().current_size, 5);
        assert!(!dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn test_reload_removes_orphaned_files() {
        let dir = TempDir::new().unwrap();
        {
            let cache = open(&dir, "1MB", false);
            cache.store("kept", b"12345", Duration::ZERO);
            cache.stop();
        }
        let data_dir = dir.path().join(DATA_DIR);
        let orphan = data_dir.join(data_file_name(&key_digest("unindexed")));
        let partial = data_dir.join(format!("{}.tmp", data_file_name(&key_digest("kept"))));
        let temp_index = dir.path().join(format!("{}.tmp", INDEX_FILE));
        fs::write(&orphan, b"lost after crash").unwrap();
        fs::write(&partial, b"12").unwrap();
        fs::write(&temp_index, b"{").unwrap();

        let cache = open(&dir, "1MB", false);

        assert!(!orphan.exists());
        assert!(!partial.exists());
        assert!(!temp_index.exists());
        assert_eq!(fs::read_dir(&data_dir).unwrap().count(), 1);
        assert_eq!(cache.fetch("kept").unwrap(), b"12345");
    }

    #[test]
    fn test_orphans_removed_without_index() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join(DATA_DIR);
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join(data_file_name(&key_digest("stray"))), b"x").unwrap();

        let cache = open(&dir, "1MB", false);

        assert_eq!(fs::read_dir(&data_dir).unwrap().count(), 0);
        assert_eq!(cache.stats().items_count, 0);
    }
}
