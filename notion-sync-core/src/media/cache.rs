//! On-disk cache of relocated media, one JSON file per source URL.
//!
//! ```text
//! {cache_dir}/
//! +-- <sha256(source_url)>.json   # {source_url, uploaded_url, cached_at}
//! ```
//!
//! Entries are written through a temp file and renamed into place, so a
//! reader never observes a half-written entry. Within a process, callers
//! serialise read-modify-write of one key through [`MediaCache::key_lock`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source_url: String,
    pub uploaded_url: String,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub count: usize,
    pub size: u64,
    pub size_formatted: String,
}

/// Exclusive hold on one cache key, from [`MediaCache::key_lock`].
pub struct KeyGuard<'a> {
    cache: &'a MediaCache,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.cache.lock_map();
        if locks.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.key);
        }
    }
}

pub struct MediaCache {
    dir: PathBuf,
    freshness: chrono::Duration,
    retention: chrono::Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Deterministic cache key of a source URL.
pub fn cache_key(source_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_url.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl MediaCache {
    pub fn new(dir: PathBuf, freshness: chrono::Duration, retention: chrono::Duration) -> Self {
        Self {
            dir,
            freshness,
            retention,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Waits for exclusive use of one cache key.
    ///
    /// The per-key mutex lives in the map only while some caller holds or
    /// waits on it; the last guard to drop removes it.
    pub async fn key_lock(&self, source_url: &str) -> KeyGuard<'_> {
        let key = cache_key(source_url);
        let lock = Arc::clone(self.lock_map().entry(key.clone()).or_default());
        let guard = lock.lock_owned().await;
        KeyGuard {
            cache: self,
            key,
            guard: Some(guard),
        }
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Uploaded URL of a fresh entry for `source_url`, if any.
    pub fn lookup(&self, source_url: &str, now: DateTime<Utc>) -> Option<String> {
        let path = self.entry_path(&cache_key(source_url));
        let raw = fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable media cache entry, treating as miss");
                return None;
            }
        };
        if now - entry.cached_at < self.freshness {
            debug!(uploaded_url = %entry.uploaded_url, "Media cache hit");
            Some(entry.uploaded_url)
        } else {
            debug!(cached_at = %entry.cached_at, "Media cache entry is stale");
            None
        }
    }

    /// Persist a new entry, replacing any previous one for the same URL.
    pub fn store(&self, source_url: &str, uploaded_url: &str, now: DateTime<Utc>) -> Result<(), SyncError> {
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            source_url: source_url.to_string(),
            uploaded_url: uploaded_url.to_string(),
            cached_at: now,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(serde_json::to_string_pretty(&entry)?.as_bytes())?;
        tmp.persist(self.entry_path(&cache_key(source_url)))
            .map_err(|e| SyncError::Io(e.error))?;
        Ok(())
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        read_dir
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect()
    }

    /// Delete entries older than the retention window; returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<usize, SyncError> {
        let mut removed = 0;
        for path in self.entry_files() {
            let cached_at = fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str::<CacheEntry>(&raw).ok())
                .map(|entry| entry.cached_at)
                .or_else(|| {
                    fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .ok()
                        .map(DateTime::<Utc>::from)
                });
            let Some(cached_at) = cached_at else {
                continue;
            };
            if now - cached_at > self.retention {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        info!(removed, dir = %self.dir.display(), "Swept expired media cache entries");
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        let files = self.entry_files();
        let size = files
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        CacheStats {
            count: files.len(),
            size,
            size_formatted: format_bytes(size),
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
