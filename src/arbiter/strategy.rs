//! Local strategic scoring
//!
//! Five independent scoring functions, each a deterministic function of the
//! snapshot and clamped to `[0, 1]`. The arbiter ranks them and uses the
//! top-2 margin to decide whether the advisor is worth asking.

use serde::{Deserialize, Serialize};

use crate::arbiter::snapshot::StrategicSnapshot;
use crate::core::config::StrategyWeights;

/// Feature tag that makes expansion attractive
pub const RESOURCE_SITE_TAG: &str = "resource_site";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategicOrder {
    Build,
    Attack,
    Tech,
    Defend,
    Expand,
}

impl StrategicOrder {
    /// Fixed scoring order; also the tie-break order when ranking
    pub const ALL: [StrategicOrder; 5] = [
        StrategicOrder::Build,
        StrategicOrder::Attack,
        StrategicOrder::Tech,
        StrategicOrder::Defend,
        StrategicOrder::Expand,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StrategicOrder::Build => "build",
            StrategicOrder::Attack => "attack",
            StrategicOrder::Tech => "tech",
            StrategicOrder::Defend => "defend",
            StrategicOrder::Expand => "expand",
        }
    }

    /// Words in a free-text recommendation that select this order
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            StrategicOrder::Build => &["build", "construct"],
            StrategicOrder::Attack => &["attack", "assault", "push"],
            StrategicOrder::Tech => &["tech", "research", "upgrade"],
            StrategicOrder::Defend => &["defend", "hold", "fortify"],
            StrategicOrder::Expand => &["expand", "settle", "claim"],
        }
    }
}

impl std::fmt::Display for StrategicOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategicCandidate {
    pub order: StrategicOrder,
    pub score: f64,
}

impl StrategicCandidate {
    pub fn new(order: StrategicOrder, score: f64) -> Self {
        Self { order, score }
    }
}

fn saturate(value: f64, saturation: f64) -> f64 {
    if saturation <= 0.0 {
        return 1.0;
    }
    (value / saturation).clamp(0.0, 1.0)
}

/// Share of the visible army that is hostile, 0.5 when nobody is present
fn threat(snapshot: &StrategicSnapshot) -> f64 {
    let own = snapshot.own_total() as f64;
    let enemy = snapshot.enemy_total() as f64;
    if own + enemy == 0.0 {
        return 0.5;
    }
    enemy / (own + enemy)
}

pub fn build_score(snapshot: &StrategicSnapshot, w: &StrategyWeights) -> f64 {
    let gold = saturate(snapshot.resources.gold as f64, w.build_gold_saturation);
    let supply = if snapshot.resources.supply_cap == 0 {
        1.0
    } else {
        saturate(snapshot.resources.supply_used as f64, snapshot.resources.supply_cap as f64)
    };
    (w.build_base * (0.5 + 0.5 * gold) + w.build_supply_pressure * supply).clamp(0.0, 1.0)
}

pub fn attack_score(snapshot: &StrategicSnapshot, w: &StrategyWeights) -> f64 {
    if snapshot.enemy_total() == 0 {
        return 0.0;
    }
    // 0.5 threat means even armies
    let advantage = (0.5 - threat(snapshot)) * 2.0;
    (w.attack_base + w.attack_advantage * advantage).clamp(0.0, 1.0)
}

pub fn tech_score(snapshot: &StrategicSnapshot, w: &StrategyWeights) -> f64 {
    let gold = saturate(snapshot.resources.gold as f64, w.tech_gold_saturation);
    let safety = if snapshot.enemy_total() == 0 { w.tech_safety_bonus } else { 0.0 };
    (w.tech_base + 0.3 * gold + safety).clamp(0.0, 1.0)
}

pub fn defend_score(snapshot: &StrategicSnapshot, w: &StrategyWeights) -> f64 {
    (w.defend_base + w.defend_threat * threat(snapshot)).clamp(0.0, 1.0)
}

pub fn expand_score(snapshot: &StrategicSnapshot, w: &StrategyWeights) -> f64 {
    let site = if snapshot.has_feature(RESOURCE_SITE_TAG) { w.expand_site_bonus } else { 0.0 };
    (w.expand_base + site).clamp(0.0, 1.0)
}

/// Score all five orders in [`StrategicOrder::ALL`] order
pub fn score_candidates(snapshot: &StrategicSnapshot, weights: &StrategyWeights) -> Vec<StrategicCandidate> {
    StrategicOrder::ALL
        .iter()
        .map(|order| {
            let score = match order {
                StrategicOrder::Build => build_score(snapshot, weights),
                StrategicOrder::Attack => attack_score(snapshot, weights),
                StrategicOrder::Tech => tech_score(snapshot, weights),
                StrategicOrder::Defend => defend_score(snapshot, weights),
                StrategicOrder::Expand => expand_score(snapshot, weights),
            };
            StrategicCandidate::new(*order, score)
        })
        .collect()
}

/// Highest score first; equal scores keep their input order
pub fn rank(mut candidates: Vec<StrategicCandidate>) -> Vec<StrategicCandidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

/// Map a free-text recommendation onto the best-ranked candidate whose
/// keywords it contains
pub fn match_recommendation(text: &str, ranked: &[StrategicCandidate]) -> Option<StrategicCandidate> {
    let text = text.to_lowercase();
    ranked
        .iter()
        .find(|c| c.order.keywords().iter().any(|k| text.contains(k)))
        .copied()
}
