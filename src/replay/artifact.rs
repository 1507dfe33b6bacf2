//! Replay artifact: compact, shareable record of one simulation run
//!
//! Immutable once sealed. The content hash covers everything except the
//! id and the hash itself, so regenerating the same run yields the same
//! bytes, the same hash and the same id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arbiter::DecisionRecord;
use crate::core::error::Result;
use crate::core::types::{FactionId, Seed, Tick};
use crate::replay::hash;
use crate::simulation::runner::ActionLogEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub headline: String,
    pub seed: Seed,
    pub commander_id: String,
    pub map_type: String,
    /// Ticks the run was asked to cover
    pub ticks: Tick,
    /// Ticks actually simulated; fewer than `ticks` means the rest was summarized
    pub simulated_ticks: Tick,
    pub winner: Option<FactionId>,
    pub survivors: BTreeMap<FactionId, u32>,
    pub losses: BTreeMap<FactionId, u32>,
    pub spawned: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMeta {
    pub engine_version: String,
    /// Some ticks were summarized rather than simulated
    pub partial: bool,
    /// FNV-1a over the artifact content, 16 hex digits
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_determinism_reason: Option<String>,
    /// Bundled sample data, not a real run
    #[serde(default)]
    pub sample: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayArtifact {
    pub replay_id: String,
    pub summary: ReplaySummary,
    pub ai_highlights: Vec<DecisionRecord>,
    pub meta: ReplayMeta,
    pub actions: Vec<ActionLogEntry>,
}

/// Everything the content hash covers
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedContent<'a> {
    summary: &'a ReplaySummary,
    ai_highlights: &'a [DecisionRecord],
    engine_version: &'a str,
    partial: bool,
    non_determinism_reason: Option<&'a str>,
    sample: bool,
    actions: &'a [ActionLogEntry],
}

impl ReplayArtifact {
    /// Assemble and seal a new artifact
    pub fn new(
        summary: ReplaySummary,
        ai_highlights: Vec<DecisionRecord>,
        actions: Vec<ActionLogEntry>,
        engine_version: impl Into<String>,
        non_determinism_reason: Option<String>,
    ) -> Result<Self> {
        let mut artifact = Self {
            replay_id: String::new(),
            summary,
            ai_highlights,
            meta: ReplayMeta {
                engine_version: engine_version.into(),
                partial: non_determinism_reason.is_some(),
                content_hash: String::new(),
                non_determinism_reason,
                sample: false,
            },
            actions,
        };
        artifact.seal()?;
        Ok(artifact)
    }

    pub fn compute_hash(&self) -> Result<u64> {
        let content = HashedContent {
            summary: &self.summary,
            ai_highlights: &self.ai_highlights,
            engine_version: &self.meta.engine_version,
            partial: self.meta.partial,
            non_determinism_reason: self.meta.non_determinism_reason.as_deref(),
            sample: self.meta.sample,
            actions: &self.actions,
        };
        let bytes = serde_json::to_vec(&content)?;
        Ok(hash::fnv1a(&bytes))
    }

    /// Stamp the content hash and the id derived from it
    pub fn seal(&mut self) -> Result<()> {
        let content_hash = self.compute_hash()?;
        self.meta.content_hash = hash::hash_hex(content_hash);
        self.replay_id = hash::replay_id(content_hash);
        Ok(())
    }

    /// Stored hash matches the content
    pub fn verify(&self) -> bool {
        self.compute_hash()
            .map(|h| hash::hash_hex(h) == self.meta.content_hash)
            .unwrap_or(false)
    }

    /// Safe to use for exact-replay verification: a complete, genuine,
    /// untampered trace
    pub fn is_exact_replay_safe(&self) -> bool {
        !self.meta.partial && !self.meta.sample && self.verify()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
