//! Monster tiers and the cumulative weight table used to pick them

use serde::{Deserialize, Serialize};

use crate::simulation::actor::{Ability, AbilityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterTier {
    Scout,
    Raider,
    Brute,
    Warlord,
}

/// Base stats for a tier
#[derive(Debug, Clone, PartialEq)]
pub struct TierStats {
    pub max_health: f64,
    pub attack: f64,
    pub defense: f64,
    pub speed: f64,
    pub ability: Option<Ability>,
}

impl MonsterTier {
    pub fn label(&self) -> &'static str {
        match self {
            MonsterTier::Scout => "scout",
            MonsterTier::Raider => "raider",
            MonsterTier::Brute => "brute",
            MonsterTier::Warlord => "warlord",
        }
    }

    pub fn stats(&self) -> TierStats {
        match self {
            MonsterTier::Scout => TierStats {
                max_health: 40.0,
                attack: 6.0,
                defense: 1.0,
                speed: 2.0,
                ability: None,
            },
            MonsterTier::Raider => TierStats {
                max_health: 70.0,
                attack: 10.0,
                defense: 3.0,
                speed: 1.6,
                ability: None,
            },
            MonsterTier::Brute => TierStats {
                max_health: 140.0,
                attack: 14.0,
                defense: 6.0,
                speed: 1.0,
                ability: Some(Ability::new(AbilityKind::Heal, 0.0, 30.0, 12)),
            },
            MonsterTier::Warlord => TierStats {
                max_health: 220.0,
                attack: 18.0,
                defense: 8.0,
                speed: 1.2,
                ability: Some(Ability::new(AbilityKind::AreaEffect, 5.0, 15.0, 10)),
            },
        }
    }
}

/// Cumulative weight table: each entry is `(tier, upper_bound)` with
/// bounds strictly increasing and the last equal to 1.0
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    entries: Vec<(MonsterTier, f64)>,
}

impl Default for TierTable {
    /// 40 / 30 / 20 / 10 across the four tiers
    fn default() -> Self {
        Self {
            entries: vec![
                (MonsterTier::Scout, 0.40),
                (MonsterTier::Raider, 0.70),
                (MonsterTier::Brute, 0.90),
                (MonsterTier::Warlord, 1.00),
            ],
        }
    }
}

impl TierTable {
    /// Build a table from relative weights (need not sum to 1)
    pub fn from_weights(weights: &[(MonsterTier, f64)]) -> Option<Self> {
        let total: f64 = weights.iter().map(|(_, w)| *w).sum();
        if weights.is_empty() || total <= 0.0 || weights.iter().any(|(_, w)| *w < 0.0) {
            return None;
        }

        let mut running = 0.0;
        let mut entries: Vec<(MonsterTier, f64)> = weights
            .iter()
            .map(|(tier, w)| {
                running += w / total;
                (*tier, running)
            })
            .collect();
        if let Some(last) = entries.last_mut() {
            last.1 = 1.0;
        }
        Some(Self { entries })
    }

    /// Map a draw in `[0, 1)` to a tier
    pub fn pick(&self, roll: f64) -> MonsterTier {
        self.entries
            .iter()
            .find(|(_, bound)| roll < *bound)
            .or_else(|| self.entries.last())
            .map(|(tier, _)| *tier)
            .unwrap_or(MonsterTier::Scout)
    }
}
