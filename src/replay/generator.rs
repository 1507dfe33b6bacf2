//! Replay generation endpoint contract and its two implementations
//!
//! - [`LocalReplayGenerator`] runs the match in-process on a blocking thread
//! - [`HttpReplayGenerator`] posts the parameters to a remote service

use std::future::Future;
use std::pin::Pin;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::config::SimConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::{Seed, Tick};
use crate::replay::artifact::{ReplayArtifact, ReplaySummary};
use crate::replay::cache::CacheKey;
use crate::simulation::runner::{MapConfig, Match};

/// Match length when the caller does not say
pub const DEFAULT_TICKS: Tick = 600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    /// Simulate every tick
    #[default]
    Full,
    /// Simulate a prefix and summarize the rest
    Fast,
}

impl std::str::FromStr for ReplayMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(ReplayMode::Full),
            "fast" => Ok(ReplayMode::Fast),
            other => Err(SimError::Configuration(format!("unknown replay mode '{}'", other))),
        }
    }
}

fn default_ticks() -> Tick {
    DEFAULT_TICKS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayParams {
    pub seed: Seed,
    pub commander_id: String,
    pub map_config: MapConfig,
    pub mode: ReplayMode,
    #[serde(default = "default_ticks")]
    pub ticks: Tick,
}

impl ReplayParams {
    pub fn new(seed: Seed, commander_id: impl Into<String>, map_config: MapConfig) -> Self {
        Self {
            seed,
            commander_id: commander_id.into(),
            map_config,
            mode: ReplayMode::Full,
            ticks: DEFAULT_TICKS,
        }
    }

    pub fn with_mode(mut self, mode: ReplayMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ticks(mut self, ticks: Tick) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.seed, self.commander_id.clone(), self.map_config.map_type.clone())
    }
}

pub type ArtifactFuture = Pin<Box<dyn Future<Output = Result<ReplayArtifact>> + Send + 'static>>;

pub trait ReplayGenerator: Send + Sync {
    fn generate(&self, params: ReplayParams) -> ArtifactFuture;
}

impl<F, Fut> ReplayGenerator for F
where
    F: Fn(ReplayParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ReplayArtifact>> + Send + 'static,
{
    fn generate(&self, params: ReplayParams) -> ArtifactFuture {
        Box::pin((self)(params))
    }
}

/// Run the match described by `params` and package it as an artifact
pub fn build_artifact(config: &SimConfig, params: &ReplayParams) -> Result<ReplayArtifact> {
    let to_simulate = match params.mode {
        ReplayMode::Full => params.ticks,
        ReplayMode::Fast => (params.ticks as f64 * config.replay.fast_mode_fraction).ceil() as Tick,
    };

    let mut game = Match::new(params.seed, params.map_config.clone(), config.clone());
    let outcome = game.run(to_simulate);

    // A match that ends early has nothing left to summarize
    let summarized = !game.is_decided() && outcome.ticks_run < params.ticks;
    let reason = summarized.then(|| {
        format!(
            "fast mode: simulated {} of {} ticks, remainder summarized",
            outcome.ticks_run, params.ticks
        )
    });

    let summary = ReplaySummary {
        headline: outcome.headline(),
        seed: params.seed,
        commander_id: params.commander_id.clone(),
        map_type: params.map_config.map_type.clone(),
        ticks: params.ticks,
        simulated_ticks: outcome.ticks_run,
        winner: outcome.winner,
        survivors: outcome.survivors,
        losses: outcome.losses,
        spawned: outcome.spawned,
    };

    ReplayArtifact::new(
        summary,
        outcome.highlights,
        game.into_log(),
        config.replay.engine_version.clone(),
        reason,
    )
}

/// In-process generator; the match runs on tokio's blocking pool
#[derive(Debug, Clone, Default)]
pub struct LocalReplayGenerator {
    config: SimConfig,
}

impl LocalReplayGenerator {
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }
}

impl ReplayGenerator for LocalReplayGenerator {
    fn generate(&self, params: ReplayParams) -> ArtifactFuture {
        let config = self.config.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || build_artifact(&config, &params))
                .await
                .map_err(|e| SimError::Transport(format!("generation task failed: {}", e)))?
        })
    }
}

/// Client for a remote replay-generation service
#[derive(Debug, Clone)]
pub struct HttpReplayGenerator {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpReplayGenerator {
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
        }
    }

    /// Required: REPLAY_API_URL
    /// Optional: REPLAY_API_KEY (sent as a bearer token)
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("REPLAY_API_URL")
            .map_err(|_| SimError::Configuration("REPLAY_API_URL not set".into()))?;
        let api_key = std::env::var("REPLAY_API_KEY").ok();
        Ok(Self::new(api_url, api_key))
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl ReplayGenerator for HttpReplayGenerator {
    fn generate(&self, params: ReplayParams) -> ArtifactFuture {
        let client = self.client.clone();
        let api_url = self.api_url.clone();
        let api_key = self.api_key.clone();
        Box::pin(async move {
            let mut request = client.post(&api_url).json(&params);
            if let Some(key) = api_key {
                request = request.bearer_auth(key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SimError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(SimError::Transport(format!("API error {}: {}", status, error_text)));
            }

            let body = response
                .text()
                .await
                .map_err(|e| SimError::Transport(e.to_string()))?;
            serde_json::from_str(&body)
                .map_err(|e| SimError::MalformedResponse(format!("replay artifact: {}", e)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: ReplayMode) -> ReplayParams {
        ReplayParams::new(31, "vex", MapConfig::default())
            .with_mode(mode)
            .with_ticks(80)
    }

    #[test]
    fn test_full_mode_is_regenerable() {
        let config = SimConfig::default();
        let a = build_artifact(&config, &params(ReplayMode::Full)).unwrap();
        let b = build_artifact(&config, &params(ReplayMode::Full)).unwrap();
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
        assert!(!a.meta.partial);
        assert!(a.is_exact_replay_safe());
        assert_eq!(a.summary.commander_id, "vex");
    }

    #[test]
    fn test_fast_mode_is_partial() {
        let config = SimConfig::default();
        let artifact = build_artifact(&config, &params(ReplayMode::Fast)).unwrap();
        assert!(artifact.meta.partial);
        assert_eq!(artifact.summary.simulated_ticks, 20);
        assert!(artifact
            .meta
            .non_determinism_reason
            .as_deref()
            .is_some_and(|r| r.starts_with("fast mode")));
        assert!(!artifact.is_exact_replay_safe());
    }

    #[test]
    fn test_params_wire_format() {
        let json = serde_json::to_value(params(ReplayMode::Fast)).unwrap();
        assert_eq!(json["mode"], "fast");
        assert_eq!(json["commanderId"], "vex");
        assert_eq!(json["mapConfig"]["type"], "plains");

        let decoded: ReplayParams =
            serde_json::from_str(r#"{"seed":1,"commanderId":"c","mapConfig":{"type":"x","width":10.0,"height":10.0},"mode":"full"}"#)
                .unwrap();
        assert_eq!(decoded.ticks, DEFAULT_TICKS);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("FAST".parse::<ReplayMode>().unwrap(), ReplayMode::Fast);
        assert!("turbo".parse::<ReplayMode>().is_err());
    }

    #[tokio::test]
    async fn test_local_generator_runs_off_thread() {
        let generator = LocalReplayGenerator::new(SimConfig::default());
        let artifact = generator.generate(params(ReplayMode::Full)).await.unwrap();
        assert!(artifact.verify());
    }

    #[test]
    fn test_http_generator_requires_url() {
        std::env::remove_var("REPLAY_API_URL");
        assert!(matches!(HttpReplayGenerator::from_env(), Err(SimError::Configuration(_))));
    }
}
