//! Replay pipeline: cache, bounded generation, sample fallback
//!
//! `generate_replay` resolves in this order:
//! 1. cache hit, returned immediately
//! 2. generation with bounded retries, all of it under one hard timeout;
//!    the result is cached (evicting the oldest entry when full) and
//!    persisted
//! 3. the bundled sample artifact, flagged as sample data and never cached
//! 4. nothing
//!
//! At most one generation per key is in flight: concurrent callers for the
//! same key await the first caller's result.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use crate::core::bounded::{BoundedCall, Resolved};
use crate::core::config::ReplayConfig;
use crate::core::error::{Result, SimError};
use crate::replay::artifact::ReplayArtifact;
use crate::replay::cache::{CacheKey, ReplayCache};
use crate::replay::generator::{ReplayGenerator, ReplayParams};
use crate::replay::sample::{mark_as_sample, SampleSource};
use crate::replay::store::ReplayStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOrigin {
    Cache,
    Generated,
    Sample,
}

#[derive(Debug, Clone)]
pub struct ReplayResult {
    pub artifact: Arc<ReplayArtifact>,
    pub origin: ReplayOrigin,
}

impl ReplayResult {
    /// Sample data, shown with an explicit marker
    pub fn is_sample(&self) -> bool {
        self.origin == ReplayOrigin::Sample || self.artifact.meta.sample
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    pub replay_id: String,
    pub url: String,
    pub title: String,
}

type InFlight = Arc<OnceCell<Option<ReplayResult>>>;

pub struct ReplayPipeline {
    config: ReplayConfig,
    generator: Arc<dyn ReplayGenerator>,
    sample: Option<Arc<dyn SampleSource>>,
    store: Option<Arc<dyn ReplayStore>>,
    cache: Mutex<ReplayCache>,
    in_flight: Mutex<AHashMap<CacheKey, InFlight>>,
    generation_requests: AtomicU32,
}

impl ReplayPipeline {
    /// Pipeline with an empty cache and no sample fallback
    pub fn new(config: ReplayConfig, generator: Arc<dyn ReplayGenerator>) -> Self {
        let cache = ReplayCache::new(config.cache_capacity);
        Self {
            config,
            generator,
            sample: None,
            store: None,
            cache: Mutex::new(cache),
            in_flight: Mutex::new(AHashMap::new()),
            generation_requests: AtomicU32::new(0),
        }
    }

    pub fn with_sample(mut self, sample: Arc<dyn SampleSource>) -> Self {
        self.sample = Some(sample);
        self
    }

    /// Attach a persistent store and warm the cache from it
    pub fn with_store(mut self, store: Arc<dyn ReplayStore>) -> Self {
        let cache = self.cache.get_mut();
        let recent = store.load_recent(cache.capacity());
        let warmed = recent.len();
        for (key, artifact) in recent {
            cache.insert(key, Arc::new(artifact));
        }
        if warmed > 0 {
            tracing::info!(entries = warmed, "replay cache warmed from store");
        }
        self.store = Some(store);
        self
    }

    /// Generation requests issued so far (cache hits and joined callers excluded)
    pub fn generation_requests(&self) -> u32 {
        self.generation_requests.load(Ordering::SeqCst)
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_cached(&self, key: &CacheKey) -> bool {
        self.cache.lock().await.contains(key)
    }

    /// Produce the artifact for `params`; `None` only when generation and
    /// every fallback failed
    pub async fn generate_replay(&self, params: ReplayParams) -> Option<ReplayResult> {
        let key = params.cache_key();
        if let Some(artifact) = self.cache.lock().await.get(&key) {
            tracing::debug!(key = %key, "replay cache hit");
            return Some(ReplayResult {
                artifact,
                origin: ReplayOrigin::Cache,
            });
        }

        let cell: InFlight = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };

        let result = cell.get_or_init(|| self.produce(key.clone(), params)).await.clone();

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            in_flight.remove(&key);
        }
        result
    }

    async fn produce(&self, key: CacheKey, params: ReplayParams) -> Option<ReplayResult> {
        // A caller that missed the cache just before another finished
        if let Some(artifact) = self.cache.lock().await.get(&key) {
            return Some(ReplayResult {
                artifact,
                origin: ReplayOrigin::Cache,
            });
        }

        self.generation_requests.fetch_add(1, Ordering::SeqCst);
        tracing::info!(key = %key, mode = ?params.mode, "generating replay");

        let call = BoundedCall::new("replay generation", self.config.generation_timeout())
            .with_retries(self.config.max_attempts, self.config.retry_backoff())
            .with_budget(self.config.generation_timeout());
        let generator = Arc::clone(&self.generator);
        let sample = self.sample.clone();

        let resolved = call
            .run_or_else(
                || {
                    let attempt = generator.generate(params.clone());
                    async move {
                        let artifact = attempt.await?;
                        if artifact.meta.sample || !artifact.verify() {
                            return Err(SimError::MalformedResponse(
                                "artifact content hash does not verify".into(),
                            ));
                        }
                        Ok(artifact)
                    }
                },
                |_cause| async move {
                    match sample {
                        Some(source) => source.load().map(mark_as_sample),
                        None => Err(SimError::NotFound("no bundled sample configured".into())),
                    }
                },
            )
            .await;

        match resolved {
            Resolved::Primary(artifact) => {
                let artifact = Arc::new(artifact);
                self.remember(key, Arc::clone(&artifact)).await;
                Some(ReplayResult {
                    artifact,
                    origin: ReplayOrigin::Generated,
                })
            }
            Resolved::Fallback(artifact, cause) => {
                tracing::warn!(reason = %cause.reason(), "replay generation failed, serving sample data");
                Some(ReplayResult {
                    artifact: Arc::new(artifact),
                    origin: ReplayOrigin::Sample,
                })
            }
            Resolved::Failed(cause) => {
                tracing::warn!(reason = %cause.reason(), "replay unavailable");
                None
            }
        }
    }

    async fn remember(&self, key: CacheKey, artifact: Arc<ReplayArtifact>) {
        let evicted = self.cache.lock().await.insert(key.clone(), Arc::clone(&artifact));

        let Some(store) = &self.store else {
            return;
        };
        if let Some(old) = evicted {
            if let Err(e) = store.remove(&old) {
                tracing::warn!(key = %old, reason = %e.reason(), "failed to drop evicted replay from store");
            }
        }
        if let Err(e) = store.save(&key, &artifact) {
            tracing::warn!(key = %key, reason = %e.reason(), "failed to persist replay");
        }
    }

    async fn find(&self, replay_id: &str) -> Result<Arc<ReplayArtifact>> {
        self.cache
            .lock()
            .await
            .get_by_id(replay_id)
            .ok_or_else(|| SimError::NotFound(format!("replay {}", replay_id)))
    }

    /// Pretty JSON of a cached artifact
    pub async fn download_replay(&self, replay_id: &str) -> Result<String> {
        self.find(replay_id).await?.to_json_pretty()
    }

    /// Shareable link for a cached artifact
    pub async fn share_replay(&self, replay_id: &str) -> Result<ShareLink> {
        let artifact = self.find(replay_id).await?;
        Ok(ShareLink {
            replay_id: artifact.replay_id.clone(),
            url: format!("{}/{}", self.config.share_base_url.trim_end_matches('/'), artifact.replay_id),
            title: artifact.summary.headline.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimConfig;
    use crate::replay::generator::{build_artifact, ReplayMode};
    use crate::replay::sample::BundledSample;
    use crate::simulation::runner::MapConfig;
    use std::time::Duration;

    fn params(seed: u32) -> ReplayParams {
        ReplayParams::new(seed, "vex", MapConfig::default()).with_ticks(30)
    }

    fn local() -> Arc<dyn ReplayGenerator> {
        Arc::new(|params: ReplayParams| async move { build_artifact(&SimConfig::default(), &params) })
    }

    #[tokio::test]
    async fn test_second_request_hits_cache() {
        let pipeline = ReplayPipeline::new(ReplayConfig::default(), local());
        let first = pipeline.generate_replay(params(1)).await.unwrap();
        let second = pipeline.generate_replay(params(1)).await.unwrap();
        assert_eq!(first.origin, ReplayOrigin::Generated);
        assert_eq!(second.origin, ReplayOrigin::Cache);
        assert_eq!(first.artifact.replay_id, second.artifact.replay_id);
        assert_eq!(pipeline.generation_requests(), 1);
    }

    #[tokio::test]
    async fn test_mode_is_not_part_of_the_key() {
        let pipeline = ReplayPipeline::new(ReplayConfig::default(), local());
        pipeline.generate_replay(params(1)).await.unwrap();
        let fast = pipeline
            .generate_replay(params(1).with_mode(ReplayMode::Fast))
            .await
            .unwrap();
        assert_eq!(fast.origin, ReplayOrigin::Cache);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_serves_flagged_sample() {
        let stuck: Arc<dyn ReplayGenerator> = Arc::new(|_params: ReplayParams| async {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Err::<ReplayArtifact, _>(SimError::Transport("unreachable".into()))
        });
        let pipeline = ReplayPipeline::new(ReplayConfig::default(), stuck).with_sample(Arc::new(BundledSample));

        let result = pipeline.generate_replay(params(1)).await.unwrap();
        assert_eq!(result.origin, ReplayOrigin::Sample);
        assert!(result.is_sample());
        assert!(result.artifact.meta.partial);
        assert!(!result.artifact.is_exact_replay_safe());
        // Samples are never cached
        assert_eq!(pipeline.cached_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_generator_is_cut_off_at_hard_timeout() {
        let hung: Arc<dyn ReplayGenerator> = Arc::new(|_params: ReplayParams| async {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Err::<ReplayArtifact, _>(SimError::Transport("unreachable".into()))
        });
        let config = ReplayConfig::default();
        let limit = config.generation_timeout();
        let pipeline = ReplayPipeline::new(config, hung).with_sample(Arc::new(BundledSample));

        let started = tokio::time::Instant::now();
        let result = pipeline.generate_replay(params(1)).await.unwrap();
        assert_eq!(result.origin, ReplayOrigin::Sample);
        assert!(started.elapsed() <= limit, "sample served after {:?}", started.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_fallback_yields_none() {
        let broken: Arc<dyn ReplayGenerator> = Arc::new(|_params: ReplayParams| async {
            Err::<ReplayArtifact, _>(SimError::Transport("connection refused".into()))
        });
        let pipeline = ReplayPipeline::new(ReplayConfig::default(), broken);
        assert!(pipeline.generate_replay(params(1)).await.is_none());
        // Retries happen inside a single generation request
        assert_eq!(pipeline.generation_requests(), 1);
    }

    #[tokio::test]
    async fn test_download_and_share() {
        let pipeline = ReplayPipeline::new(ReplayConfig::default(), local());
        let result = pipeline.generate_replay(params(4)).await.unwrap();
        let id = result.artifact.replay_id.clone();

        let json = pipeline.download_replay(&id).await.unwrap();
        let decoded: ReplayArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.replay_id, id);
        assert!(decoded.verify());

        let link = pipeline.share_replay(&id).await.unwrap();
        assert_eq!(link.url, format!("https://replays.skirmish.local/r/{}", id));
        assert_eq!(link.title, result.artifact.summary.headline);

        assert!(matches!(
            pipeline.download_replay("rp-unknown").await,
            Err(SimError::NotFound(_))
        ));
    }
}
