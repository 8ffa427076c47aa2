//! On-disk audio cache
//!
//! One [`AudioCache`] per namespace (synthesized speech, streamed audio),
//! each a directory of `<sha256-hex>.audio` files under its own size budget.
//!
//! # Guarantees
//!
//! - `put` is atomic: bytes land in a hidden temporary sibling which is then
//!   renamed into place, so readers never observe a partial entry.
//! - After every `put`, least-recently-accessed entries are evicted until the
//!   total size is within budget.
//! - The in-memory index is rebuilt from the directory on open; file mtimes
//!   seed the access order, and `get` refreshes them.

use crate::error::{Error, Result};
use crate::markup::Script;
use cantor_common::{CantorEvent, EventBus};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Namespace for synthesized speech
pub const SPEECH_NAMESPACE: &str = "speech";

/// Namespace for streamed audio
pub const STREAM_NAMESPACE: &str = "stream";

const ENTRY_EXTENSION: &str = "audio";
const TEMP_EXTENSION: &str = "tmp";

/// Cache key of a synthesized script: SHA-256 of the canonical script and voice id
pub fn speech_key(script: &Script, voice_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(script.canonical().as_bytes());
    hasher.update([0u8]);
    hasher.update(voice_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache key of a streamed URL
pub fn stream_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.trim().as_bytes()))
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 128 && key.chars().all(|c| c.is_ascii_hexdigit())
}

/// Cache statistics for settings screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub budget_bytes: u64,
}

/// Result of an eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: Vec<String>,
    pub freed_bytes: u64,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    size: u64,
    /// Access sequence number; higher is more recent
    last_access: u64,
}

#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<String, IndexEntry>,
    total_bytes: u64,
    next_seq: u64,
}

impl CacheIndex {
    fn touch(&mut self, key: &str) -> bool {
        let seq = self.next_seq;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = seq;
                self.next_seq += 1;
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, key: String, size: u64) {
        let entry = IndexEntry {
            size,
            last_access: self.next_seq,
        };
        self.next_seq += 1;
        if let Some(old) = self.entries.insert(key, entry) {
            self.total_bytes -= old.size;
        }
        self.total_bytes += size;
    }

    fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        let removed = self.entries.remove(key)?;
        self.total_bytes -= removed.size;
        Some(removed)
    }

    /// Pop least-recently-accessed entries until within `budget`
    fn take_over_budget(&mut self, budget: u64) -> Vec<(String, u64)> {
        let mut victims = Vec::new();
        while self.total_bytes > budget {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone());
            let Some(key) = oldest else { break };
            if let Some(entry) = self.remove(&key) {
                victims.push((key, entry.size));
            }
        }
        victims
    }
}

/// Size-bounded LRU cache of audio files
pub struct AudioCache {
    namespace: String,
    dir: PathBuf,
    budget_bytes: u64,
    index: Mutex<CacheIndex>,
    /// Per-key locks collapsing concurrent producers of the same entry
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    events: Option<EventBus>,
}

impl AudioCache {
    /// Open (creating if needed) the cache directory and rebuild the index
    ///
    /// Entries beyond `budget_bytes` are evicted before returning.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created or listed.
    pub async fn open(namespace: impl Into<String>, dir: impl Into<PathBuf>, budget_bytes: u64) -> Result<Self> {
        let namespace = namespace.into();
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let scan_dir = dir.clone();
        let found = tokio::task::spawn_blocking(move || scan(&scan_dir))
            .await
            .map_err(|e| Error::InvalidState(format!("Cache scan task failed: {}", e)))??;

        let mut index = CacheIndex::default();
        for (key, size) in found {
            index.insert(key, size);
        }
        info!(
            namespace = %namespace,
            entries = index.entries.len(),
            total_bytes = index.total_bytes,
            budget_bytes,
            "Opened audio cache at {}",
            dir.display()
        );

        let cache = Self {
            namespace,
            dir,
            budget_bytes,
            index: Mutex::new(index),
            in_flight: Mutex::new(HashMap::new()),
            events: None,
        };
        cache.evict_if_over_budget().await?;
        Ok(cache)
    }

    /// Report evictions on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    /// Cheap existence check: indexed and the file is present and non-empty
    pub fn is_cached(&self, key: &str) -> bool {
        if !is_valid_key(key) {
            return false;
        }
        let indexed = match self.index.lock() {
            Ok(index) => index.entries.contains_key(key),
            Err(_) => false,
        };
        indexed && file_len(&self.entry_path(key)) > 0
    }

    /// Path of the entry for `key`, marking it most recently used
    ///
    /// An indexed entry whose file has disappeared is dropped and reported
    /// as a miss.
    pub async fn get(&self, key: &str) -> Option<PathBuf> {
        if !is_valid_key(key) {
            return None;
        }
        let path = self.entry_path(key);
        let present = tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);

        let mut index = self.index.lock().ok()?;
        if !present {
            if index.remove(key).is_some() {
                warn!(namespace = %self.namespace, key, "Cache entry vanished from disk");
            }
            return None;
        }
        if !index.touch(key) {
            return None;
        }
        drop(index);

        debug!(namespace = %self.namespace, key, "Cache hit");
        let touched = path.clone();
        tokio::task::spawn_blocking(move || {
            // Persists recency across restarts; failure only costs LRU accuracy
            if let Ok(file) = std::fs::File::options().write(true).open(&touched) {
                let _ = file.set_modified(SystemTime::now());
            }
        });
        Some(path)
    }

    /// Read the bytes of an entry
    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.get(key).await {
            Some(path) => Ok(Some(tokio::fs::read(&path).await?)),
            None => Ok(None),
        }
    }

    /// Store `bytes` under `key` and enforce the budget
    ///
    /// # Errors
    ///
    /// Returns `CacheWrite` if the key is malformed, the entry alone exceeds
    /// the budget, or the file cannot be written.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        if !is_valid_key(key) {
            return Err(Error::CacheWrite(format!("Invalid cache key {:?}", key)));
        }
        let size = bytes.len() as u64;
        if size > self.budget_bytes {
            return Err(Error::CacheWrite(format!(
                "Entry of {} bytes exceeds {} cache budget of {} bytes",
                size, self.namespace, self.budget_bytes
            )));
        }

        let final_path = self.entry_path(key);
        let temp_path = self
            .dir
            .join(format!(".{}.{}.{}", key, Uuid::new_v4().simple(), TEMP_EXTENSION));

        if let Err(e) = tokio::fs::write(&temp_path, bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::CacheWrite(format!("{}: {}", temp_path.display(), e)));
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::CacheWrite(format!("{}: {}", final_path.display(), e)));
        }

        self.index
            .lock()
            .map_err(|_| Error::InvalidState("Cache index lock poisoned".to_string()))?
            .insert(key.to_string(), size);
        debug!(namespace = %self.namespace, key, size, "Cache put");

        self.evict_if_over_budget().await?;
        Ok(final_path)
    }

    /// Evict least-recently-accessed entries until within budget
    pub async fn evict_if_over_budget(&self) -> Result<EvictionReport> {
        let victims = self
            .index
            .lock()
            .map_err(|_| Error::InvalidState("Cache index lock poisoned".to_string()))?
            .take_over_budget(self.budget_bytes);

        let mut report = EvictionReport::default();
        for (key, size) in victims {
            match tokio::fs::remove_file(self.entry_path(&key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(namespace = %self.namespace, key = %key, "Failed to remove evicted entry: {}", e),
            }
            report.freed_bytes += size;
            report.evicted.push(key);
        }

        if !report.evicted.is_empty() {
            info!(
                namespace = %self.namespace,
                evicted = report.evicted.len(),
                freed_bytes = report.freed_bytes,
                "Evicted cache entries"
            );
            if let Some(events) = &self.events {
                events.emit_lossy(CantorEvent::CacheEvicted {
                    namespace: self.namespace.clone(),
                    evicted_entries: report.evicted.len(),
                    freed_bytes: report.freed_bytes,
                    timestamp: Utc::now(),
                });
            }
        }
        Ok(report)
    }

    /// Remove every entry unconditionally
    pub async fn clear(&self) -> Result<usize> {
        let keys: Vec<String> = {
            let mut index = self
                .index
                .lock()
                .map_err(|_| Error::InvalidState("Cache index lock poisoned".to_string()))?;
            let keys = index.entries.keys().cloned().collect();
            *index = CacheIndex {
                next_seq: index.next_seq,
                ..Default::default()
            };
            keys
        };

        for key in &keys {
            match tokio::fs::remove_file(self.entry_path(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(namespace = %self.namespace, removed = keys.len(), "Cleared audio cache");
        Ok(keys.len())
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, total_bytes) = match self.index.lock() {
            Ok(index) => (index.entries.len(), index.total_bytes),
            Err(_) => (0, 0),
        };
        CacheStats {
            entries,
            total_bytes,
            budget_bytes: self.budget_bytes,
        }
    }

    /// Exclusive producer slot for `key`
    ///
    /// Holders of the same key run one at a time; a second caller waits for
    /// the first and should re-check the cache once it gets the slot.
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut in_flight = match self.in_flight.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Drop slots nobody holds or waits on
            in_flight.retain(|_, slot| Arc::strong_count(slot) > 1);
            in_flight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

impl std::fmt::Debug for AudioCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCache")
            .field("namespace", &self.namespace)
            .field("dir", &self.dir)
            .field("budget_bytes", &self.budget_bytes)
            .finish()
    }
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path)
        .map(|meta| if meta.is_file() { meta.len() } else { 0 })
        .unwrap_or(0)
}

/// List entries oldest-first, removing leftover temporary files
fn scan(dir: &Path) -> Result<Vec<(String, u64)>> {
    let mut found: Vec<(SystemTime, String, u64)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };

        if extension == TEMP_EXTENSION {
            debug!("Removing stale temporary file {}", path.display());
            let _ = std::fs::remove_file(&path);
            continue;
        }
        if extension != ENTRY_EXTENSION {
            continue;
        }

        let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !is_valid_key(key) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() || meta.len() == 0 {
            let _ = std::fs::remove_file(&path);
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((modified, key.to_string(), meta.len()));
    }

    found.sort();
    Ok(found.into_iter().map(|(_, key, size)| (key, size)).collect())
}
