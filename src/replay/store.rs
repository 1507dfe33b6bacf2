//! Persistent local replay store
//!
//! Remembers recent artifacts across restarts. Anything unreadable is a
//! cache miss: it is logged and skipped, never surfaced as an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::replay::artifact::ReplayArtifact;
use crate::replay::cache::CacheKey;
use crate::replay::hash::{fnv1a, hash_hex};

pub trait ReplayStore: Send + Sync {
    /// Stored entries, oldest first, at most `limit` (the most recent ones)
    fn load_recent(&self, limit: usize) -> Vec<(CacheKey, ReplayArtifact)>;
    fn save(&self, key: &CacheKey, artifact: &ReplayArtifact) -> Result<()>;
    fn remove(&self, key: &CacheKey) -> Result<()>;
}

/// On-disk entry format
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredReplay {
    /// Insertion order across the whole store
    sequence: u64,
    key: CacheKey,
    artifact: ReplayArtifact,
}

/// One JSON file per cache key inside a directory
#[derive(Debug)]
pub struct FileReplayStore {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl FileReplayStore {
    /// Open (creating if needed) a store directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let store = Self {
            dir,
            sequence: AtomicU64::new(0),
        };
        let next = store
            .read_all()
            .iter()
            .map(|entry| entry.sequence + 1)
            .max()
            .unwrap_or(0);
        store.sequence.store(next, Ordering::SeqCst);
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `key`, named by a hash of a length-prefixed encoding so
    /// that distinct keys never share a name through separator characters
    fn path_for(&self, key: &CacheKey) -> PathBuf {
        let encoded = format!(
            "{}:{}:{}:{}",
            key.seed,
            key.commander_id.len(),
            key.commander_id,
            key.map_type
        );
        self.dir.join(format!("{}.json", hash_hex(fnv1a(encoded.as_bytes()))))
    }

    fn read_entry(path: &Path) -> Result<StoredReplay> {
        let contents = fs::read_to_string(path)?;
        let entry: StoredReplay = serde_json::from_str(&contents)
            .map_err(|e| SimError::CacheCorruption(format!("{}: {}", path.display(), e)))?;
        if !entry.artifact.meta.sample && !entry.artifact.verify() {
            return Err(SimError::CacheCorruption(format!("{}: content hash mismatch", path.display())));
        }
        Ok(entry)
    }

    fn read_all(&self) -> Vec<StoredReplay> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "replay store unreadable");
                return Vec::new();
            }
        };

        let mut stored = Vec::new();
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_entry(&path) {
                Ok(entry) => stored.push(entry),
                Err(e) => tracing::warn!(reason = %e.reason(), "skipping unreadable replay cache entry"),
            }
        }
        stored.sort_by_key(|entry| entry.sequence);
        stored
    }
}

impl ReplayStore for FileReplayStore {
    fn load_recent(&self, limit: usize) -> Vec<(CacheKey, ReplayArtifact)> {
        let mut stored = self.read_all();
        let excess = stored.len().saturating_sub(limit);
        stored
            .drain(..)
            .skip(excess)
            .map(|entry| (entry.key, entry.artifact))
            .collect()
    }

    fn save(&self, key: &CacheKey, artifact: &ReplayArtifact) -> Result<()> {
        let entry = StoredReplay {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            key: key.clone(),
            artifact: artifact.clone(),
        };
        let path = self.path_for(key);
        if let Ok(existing) = Self::read_entry(&path) {
            if existing.key != *key {
                return Err(SimError::CacheCorruption(format!(
                    "{} already holds {}, not {}",
                    path.display(),
                    existing.key,
                    key
                )));
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<()> {
        let path = self.path_for(key);
        if let Ok(existing) = Self::read_entry(&path) {
            if existing.key != *key {
                tracing::warn!(key = %key, stored = %existing.key, "store file holds another key, leaving it");
                return Ok(());
            }
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store, mostly for tests
#[derive(Debug, Default)]
pub struct MemoryReplayStore {
    entries: Mutex<Vec<(CacheKey, ReplayArtifact)>>,
}

impl MemoryReplayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReplayStore for MemoryReplayStore {
    fn load_recent(&self, limit: usize) -> Vec<(CacheKey, ReplayArtifact)> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let excess = entries.len().saturating_sub(limit);
        entries.iter().skip(excess).cloned().collect()
    }

    fn save(&self, key: &CacheKey, artifact: &ReplayArtifact) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SimError::CacheCorruption("memory store lock poisoned".into()))?;
        entries.retain(|(k, _)| k != key);
        entries.push((key.clone(), artifact.clone()));
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SimError::CacheCorruption("memory store lock poisoned".into()))?;
        entries.retain(|(k, _)| k != key);
        Ok(())
    }
}
