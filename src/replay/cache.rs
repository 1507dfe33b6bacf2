//! Capacity-bounded replay cache, evicting the least recently inserted entry

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::types::Seed;
use crate::replay::artifact::ReplayArtifact;

/// Identity of a run for caching: `(seed, commander, map type)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub seed: Seed,
    pub commander_id: String,
    pub map_type: String,
}

impl CacheKey {
    pub fn new(seed: Seed, commander_id: impl Into<String>, map_type: impl Into<String>) -> Self {
        Self {
            seed,
            commander_id: commander_id.into(),
            map_type: map_type.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.seed, self.commander_id, self.map_type)
    }
}

#[derive(Debug, Clone)]
pub struct ReplayCache {
    capacity: usize,
    /// Oldest insertion at the front
    entries: VecDeque<(CacheKey, Arc<ReplayArtifact>)>,
}

impl ReplayCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ReplayArtifact>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, artifact)| Arc::clone(artifact))
    }

    pub fn get_by_id(&self, replay_id: &str) -> Option<Arc<ReplayArtifact>> {
        self.entries
            .iter()
            .find(|(_, a)| a.replay_id == replay_id)
            .map(|(_, artifact)| Arc::clone(artifact))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert (re-inserting moves the key to the newest position); returns
    /// the evicted key when over capacity
    pub fn insert(&mut self, key: CacheKey, artifact: Arc<ReplayArtifact>) -> Option<CacheKey> {
        self.entries.retain(|(k, _)| k != &key);
        self.entries.push_back((key, artifact));
        if self.entries.len() > self.capacity {
            self.entries.pop_front().map(|(evicted, _)| evicted)
        } else {
            None
        }
    }

    /// Keys oldest first
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.iter().map(|(k, _)| k)
    }
}
