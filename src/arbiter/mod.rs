//! Hybrid decision arbiter
//!
//! One instance per AI-controlled faction. Every `decision_cooldown` ticks
//! it scores five strategic orders locally. A clear local winner is used
//! directly; a close call is handed to the advisor, bounded by a timeout.
//! The advisory call runs on its own task and is polled on later ticks, so
//! the simulation never waits for it. Any failure falls back to the local
//! greedy pick.

pub mod advisor;
pub mod history;
pub mod snapshot;
pub mod strategy;

pub use advisor::{Advice, AdviceFuture, Advisor};
pub use history::{DecisionHistory, DecisionRecord, DecisionSource};
pub use snapshot::StrategicSnapshot;
pub use strategy::{StrategicCandidate, StrategicOrder};

use std::sync::Arc;

use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::core::bounded::BoundedCall;
use crate::core::config::ArbiterConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::{FactionId, Tick};

/// Confidence recorded when the advisor's answer matched a candidate
const REMOTE_MATCH_CONFIDENCE: f64 = 0.8;
/// Confidence recorded when the advisor's answer matched nothing
const REMOTE_UNMATCHED_CONFIDENCE: f64 = 0.5;

/// Confidence of a local pick: 0.5 for a dead heat, 1.0 for a runaway winner
fn margin_confidence(top: f64, margin: f64) -> f64 {
    if top <= 0.0 {
        return 0.5;
    }
    (0.5 + 0.5 * (margin / top)).clamp(0.0, 1.0)
}

/// An advisory call in flight
struct PendingAdvice {
    tick: Tick,
    ranked: Vec<StrategicCandidate>,
    margin: f64,
    rx: oneshot::Receiver<Result<Advice>>,
    task: JoinHandle<()>,
    deadline: Instant,
}

impl Drop for PendingAdvice {
    fn drop(&mut self) {
        // A late answer must never be applied, and nothing keeps running
        self.task.abort();
    }
}

pub struct HybridArbiter {
    faction: FactionId,
    config: ArbiterConfig,
    last_decision_tick: Option<Tick>,
    history: DecisionHistory,
    advisor: Option<Arc<dyn Advisor>>,
    pending: Option<PendingAdvice>,
    remote_calls: u32,
}

impl std::fmt::Debug for HybridArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridArbiter")
            .field("faction", &self.faction)
            .field("last_decision_tick", &self.last_decision_tick)
            .field("history_len", &self.history.len())
            .field("has_advisor", &self.advisor.is_some())
            .field("pending", &self.pending.is_some())
            .field("remote_calls", &self.remote_calls)
            .finish()
    }
}

impl HybridArbiter {
    /// Arbiter without an advisor: close calls fall back to the greedy pick
    pub fn new(faction: FactionId, config: ArbiterConfig) -> Self {
        let history = DecisionHistory::new(config.history_capacity);
        Self {
            faction,
            config,
            last_decision_tick: None,
            history,
            advisor: None,
            pending: None,
            remote_calls: 0,
        }
    }

    pub fn with_advisor(faction: FactionId, config: ArbiterConfig, advisor: Arc<dyn Advisor>) -> Self {
        let mut arbiter = Self::new(faction, config);
        arbiter.advisor = Some(advisor);
        arbiter
    }

    pub fn faction(&self) -> FactionId {
        self.faction
    }

    pub fn last_decision_tick(&self) -> Option<Tick> {
        self.last_decision_tick
    }

    /// Advisory calls issued so far
    pub fn remote_calls(&self) -> u32 {
        self.remote_calls
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn decision_history(&self) -> &DecisionHistory {
        &self.history
    }

    /// Recent confident, non-fallback decisions for replay highlights
    pub fn highlights(&self, max_n: usize) -> Vec<DecisionRecord> {
        self.history.highlights(max_n, self.config.highlight_threshold)
    }

    /// Per-tick entry point: settle a pending advisory call if possible,
    /// otherwise decide when the cooldown allows
    pub fn tick(&mut self, tick: Tick, snapshot: &StrategicSnapshot) -> Option<DecisionRecord> {
        if let Some(record) = self.poll_pending() {
            return Some(record);
        }
        if !self.ready(tick) {
            return None;
        }
        let candidates = strategy::score_candidates(snapshot, &self.config.weights);
        self.arbitrate(tick, snapshot, candidates)
    }

    /// Cooldown elapsed and nothing in flight
    pub fn ready(&self, tick: Tick) -> bool {
        if self.pending.is_some() {
            return false;
        }
        match self.last_decision_tick {
            Some(last) => tick.saturating_sub(last) >= self.config.decision_cooldown,
            None => true,
        }
    }

    /// Decide between the given local candidates. Returns the record when
    /// the decision completes now, `None` when on cooldown or when an
    /// advisory call was started.
    pub fn arbitrate(
        &mut self,
        tick: Tick,
        snapshot: &StrategicSnapshot,
        candidates: Vec<StrategicCandidate>,
    ) -> Option<DecisionRecord> {
        if !self.ready(tick) {
            return None;
        }
        let ranked = strategy::rank(candidates);
        let greedy = *ranked.first()?;
        let second = ranked.get(1).map_or(0.0, |c| c.score);
        let margin = greedy.score - second;

        if margin >= self.config.margin_threshold * greedy.score {
            let record = DecisionRecord {
                tick,
                order: greedy.order,
                reason: format!("clear local preference ({:.2} vs {:.2})", greedy.score, second),
                confidence: margin_confidence(greedy.score, margin),
                source: DecisionSource::Local,
                fallback: false,
            };
            return Some(self.commit(record));
        }

        let Some(advisor) = self.advisor.clone() else {
            return Some(self.fall_back(tick, &ranked, margin, "advisor unavailable".into()));
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Some(self.fall_back(tick, &ranked, margin, "advisor unavailable".into()));
        };

        let (tx, rx) = oneshot::channel();
        let call = BoundedCall::new("advisory", self.config.advisory_timeout());
        let request = snapshot.clone();
        let task = runtime.spawn(async move {
            let result = call.run(|| advisor.advise(request.clone())).await;
            // Receiver gone means the decision already fell back
            let _ = tx.send(result);
        });

        tracing::debug!(faction = self.faction.0, tick, margin, "close call, consulting advisor");
        self.remote_calls += 1;
        self.last_decision_tick = Some(tick);
        self.pending = Some(PendingAdvice {
            tick,
            ranked,
            margin,
            rx,
            task,
            deadline: Instant::now() + self.config.advisory_timeout(),
        });
        None
    }

    /// Non-blocking check on the in-flight advisory call
    pub fn poll_pending(&mut self) -> Option<DecisionRecord> {
        let timeout = self.config.advisory_timeout();
        let pending = self.pending.as_mut()?;
        let outcome = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) if Instant::now() < pending.deadline => return None,
            Err(TryRecvError::Empty) => Err(SimError::Timeout(timeout)),
            Err(TryRecvError::Closed) => Err(SimError::Transport("advisory task ended without a result".into())),
        };
        let pending = self.pending.take()?;
        Some(self.resolve(pending, outcome))
    }

    /// Wait for the in-flight advisory call to answer or hit its deadline
    pub async fn settle(&mut self) -> Option<DecisionRecord> {
        let timeout = self.config.advisory_timeout();
        let pending = self.pending.as_mut()?;
        let deadline = pending.deadline;
        let outcome = tokio::select! {
            received = &mut pending.rx => received
                .unwrap_or_else(|_| Err(SimError::Transport("advisory task ended without a result".into()))),
            _ = tokio::time::sleep_until(deadline) => Err(SimError::Timeout(timeout)),
        };
        let pending = self.pending.take()?;
        Some(self.resolve(pending, outcome))
    }

    /// Abandon the in-flight advisory call without recording a decision
    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(faction = self.faction.0, tick = pending.tick, "advisory call cancelled");
        }
    }

    fn resolve(&mut self, pending: PendingAdvice, outcome: Result<Advice>) -> DecisionRecord {
        let advice = match outcome {
            Ok(advice) => advice,
            Err(e) => return self.fall_back(pending.tick, &pending.ranked, pending.margin, e.reason()),
        };

        let record = match strategy::match_recommendation(&advice.recommended_action, &pending.ranked) {
            Some(matched) => DecisionRecord {
                tick: pending.tick,
                order: matched.order,
                reason: format!("advisor recommended '{}'", advice.recommended_action),
                confidence: REMOTE_MATCH_CONFIDENCE,
                source: DecisionSource::Remote,
                fallback: false,
            },
            None => DecisionRecord {
                tick: pending.tick,
                order: pending.ranked[0].order,
                reason: format!(
                    "advisor recommendation '{}' matched no candidate, using greedy",
                    advice.recommended_action
                ),
                confidence: REMOTE_UNMATCHED_CONFIDENCE,
                source: DecisionSource::Remote,
                fallback: false,
            },
        };
        self.commit(record)
    }

    fn fall_back(&mut self, tick: Tick, ranked: &[StrategicCandidate], margin: f64, reason: String) -> DecisionRecord {
        let greedy = ranked[0];
        tracing::warn!(faction = self.faction.0, tick, reason = %reason, "advisory failed, using greedy");
        let record = DecisionRecord {
            tick,
            order: greedy.order,
            reason,
            confidence: margin_confidence(greedy.score, margin),
            source: DecisionSource::Local,
            fallback: true,
        };
        self.commit(record)
    }

    fn commit(&mut self, record: DecisionRecord) -> DecisionRecord {
        tracing::info!(
            faction = self.faction.0,
            tick = record.tick,
            order = %record.order,
            source = ?record.source,
            fallback = record.fallback,
            "strategic decision"
        );
        self.last_decision_tick = Some(record.tick);
        self.history.push(record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn candidates(top: f64, second: f64) -> Vec<StrategicCandidate> {
        vec![
            StrategicCandidate::new(StrategicOrder::Build, top),
            StrategicCandidate::new(StrategicOrder::Attack, second),
        ]
    }

    fn config() -> ArbiterConfig {
        ArbiterConfig::default()
    }

    fn fixed_advisor(text: &'static str) -> Arc<dyn Advisor> {
        Arc::new(move |_snapshot: StrategicSnapshot| async move { Ok::<_, SimError>(Advice::new(text)) })
    }

    #[test]
    fn test_clear_margin_stays_local() {
        let mut arbiter = HybridArbiter::new(FactionId(1), config());
        let record = arbiter
            .arbitrate(0, &StrategicSnapshot::default(), candidates(0.8, 0.2))
            .expect("decided locally");
        assert_eq!(record.order, StrategicOrder::Build);
        assert_eq!(record.source, DecisionSource::Local);
        assert!(!record.fallback);
        assert_eq!(arbiter.remote_calls(), 0);
    }

    #[test]
    fn test_cooldown_blocks_decisions() {
        let mut arbiter = HybridArbiter::new(FactionId(1), config());
        let snapshot = StrategicSnapshot::default();
        assert!(arbiter.arbitrate(5, &snapshot, candidates(0.8, 0.2)).is_some());
        assert!(arbiter.arbitrate(14, &snapshot, candidates(0.8, 0.2)).is_none());
        assert!(arbiter.arbitrate(15, &snapshot, candidates(0.8, 0.2)).is_some());
        assert_eq!(arbiter.decision_history().len(), 2);
    }

    #[test]
    fn test_close_call_without_advisor_falls_back() {
        let mut arbiter = HybridArbiter::new(FactionId(1), config());
        let record = arbiter
            .arbitrate(0, &StrategicSnapshot::default(), candidates(0.52, 0.50))
            .expect("fallback is immediate");
        assert!(record.fallback);
        assert_eq!(record.source, DecisionSource::Local);
        assert_eq!(record.reason, "advisor unavailable");
        assert_eq!(record.order, StrategicOrder::Build);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_margin_never_calls_advisor() {
        let mut arbiter = HybridArbiter::with_advisor(FactionId(1), config(), fixed_advisor("attack"));
        let record = arbiter.arbitrate(0, &StrategicSnapshot::default(), candidates(0.8, 0.2));
        assert!(record.is_some());
        assert_eq!(arbiter.remote_calls(), 0);
        assert!(!arbiter.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_call_uses_matching_advice() {
        let mut arbiter = HybridArbiter::with_advisor(FactionId(1), config(), fixed_advisor("Push with everything"));
        assert!(arbiter.arbitrate(0, &StrategicSnapshot::default(), candidates(0.52, 0.50)).is_none());
        assert_eq!(arbiter.remote_calls(), 1);

        let record = arbiter.settle().await.expect("advisor answered");
        assert_eq!(record.order, StrategicOrder::Attack);
        assert_eq!(record.source, DecisionSource::Remote);
        assert!(!record.fallback);
        assert_eq!(record.tick, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_advice_uses_greedy() {
        let mut arbiter = HybridArbiter::with_advisor(FactionId(1), config(), fixed_advisor("meditate"));
        arbiter.arbitrate(0, &StrategicSnapshot::default(), candidates(0.52, 0.50));
        let record = arbiter.settle().await.expect("advisor answered");
        assert_eq!(record.order, StrategicOrder::Build);
        assert_eq!(record.source, DecisionSource::Remote);
        assert!(!record.fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_advisor_times_out_when_polled() {
        let slow: Arc<dyn Advisor> = Arc::new(|_snapshot: StrategicSnapshot| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, SimError>(Advice::new("attack"))
        });
        let mut arbiter = HybridArbiter::with_advisor(FactionId(1), config(), slow);
        let snapshot = StrategicSnapshot::default();
        assert!(arbiter.arbitrate(0, &snapshot, candidates(0.52, 0.50)).is_none());

        // Still pending: ticks keep flowing without a decision
        assert!(arbiter.tick(1, &snapshot).is_none());
        assert!(arbiter.has_pending());

        tokio::time::advance(Duration::from_millis(2_001)).await;
        let record = arbiter.tick(2, &snapshot).expect("deadline passed");
        assert!(record.fallback);
        assert_eq!(record.source, DecisionSource::Local);
        assert_eq!(record.order, StrategicOrder::Build);
        assert!(record.reason.starts_with("timeout"));
        assert!(!arbiter.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_advice_falls_back() {
        let broken: Arc<dyn Advisor> = Arc::new(|_snapshot: StrategicSnapshot| async { Advice::parse("I refuse") });
        let mut arbiter = HybridArbiter::with_advisor(FactionId(1), config(), broken);
        arbiter.arbitrate(0, &StrategicSnapshot::default(), candidates(0.52, 0.50));
        let record = arbiter.settle().await.expect("resolved");
        assert!(record.fallback);
        assert!(record.reason.starts_with("malformed response"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_records_nothing() {
        let slow: Arc<dyn Advisor> = Arc::new(|_snapshot: StrategicSnapshot| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, SimError>(Advice::new("attack"))
        });
        let mut arbiter = HybridArbiter::with_advisor(FactionId(1), config(), slow);
        arbiter.arbitrate(0, &StrategicSnapshot::default(), candidates(0.52, 0.50));
        arbiter.cancel_pending();
        assert!(!arbiter.has_pending());
        assert!(arbiter.decision_history().is_empty());
        assert!(arbiter.poll_pending().is_none());
    }

    #[test]
    fn test_highlights_skip_fallbacks() {
        let mut arbiter = HybridArbiter::new(FactionId(1), config());
        let snapshot = StrategicSnapshot::default();
        arbiter.arbitrate(0, &snapshot, candidates(0.9, 0.1));
        arbiter.arbitrate(10, &snapshot, candidates(0.52, 0.50));
        arbiter.arbitrate(20, &snapshot, candidates(0.9, 0.3));
        let highlights = arbiter.highlights(5);
        assert_eq!(highlights.iter().map(|r| r.tick).collect::<Vec<_>>(), vec![0, 20]);
    }
}
