//! Replay cache and generation pipeline
//!
//! Turns a run's identifying parameters into a compact, shareable
//! [`ReplayArtifact`]: summary, decision highlights, action log and
//! determinism flags.

pub mod artifact;
pub mod cache;
pub mod generator;
pub mod hash;
pub mod pipeline;
pub mod sample;
pub mod store;

pub use artifact::{ReplayArtifact, ReplayMeta, ReplaySummary};
pub use cache::{CacheKey, ReplayCache};
pub use generator::{
    build_artifact, HttpReplayGenerator, LocalReplayGenerator, ReplayGenerator, ReplayMode, ReplayParams,
};
pub use pipeline::{ReplayOrigin, ReplayPipeline, ReplayResult, ShareLink};
pub use sample::{BundledSample, SampleSource};
pub use store::{FileReplayStore, MemoryReplayStore, ReplayStore};
