//! Bundled static sample artifact, the last-resort generation fallback

use crate::core::error::{Result, SimError};
use crate::replay::artifact::ReplayArtifact;

/// Reason stamped on every sample artifact
pub const SAMPLE_REASON: &str = "bundled sample data";

const BUNDLED_SAMPLE_JSON: &str = include_str!("../../data/sample_replay.json");

/// Where the fallback artifact comes from
pub trait SampleSource: Send + Sync {
    fn load(&self) -> Result<ReplayArtifact>;
}

impl<F> SampleSource for F
where
    F: Fn() -> Result<ReplayArtifact> + Send + Sync,
{
    fn load(&self) -> Result<ReplayArtifact> {
        (self)()
    }
}

/// The sample compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledSample;

impl SampleSource for BundledSample {
    fn load(&self) -> Result<ReplayArtifact> {
        let artifact: ReplayArtifact = serde_json::from_str(BUNDLED_SAMPLE_JSON)
            .map_err(|e| SimError::MalformedResponse(format!("bundled sample: {}", e)))?;
        Ok(mark_as_sample(artifact))
    }
}

/// Flag an artifact as sample data so it can never pass for a real trace
pub fn mark_as_sample(mut artifact: ReplayArtifact) -> ReplayArtifact {
    artifact.meta.sample = true;
    artifact.meta.partial = true;
    artifact.meta.non_determinism_reason = Some(SAMPLE_REASON.to_string());
    artifact
}
