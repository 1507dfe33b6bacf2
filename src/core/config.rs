//! Simulation configuration with documented constants
//!
//! All tunable numbers are collected here. The specific values shape the
//! heuristics (relative ordering, trigger points) but are not contracts:
//! load a different TOML file to retune them.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::Vec2;

/// Spawner configuration, static per simulation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpawnConfig {
    /// Minimum placement distance from the chosen spawn point
    pub min_distance: f64,
    /// Maximum placement distance from the chosen spawn point
    pub max_distance: f64,
    /// Live spawned entities allowed at once
    pub max_concurrent_monsters: usize,
    /// Probability of a spawn once cooldown and capacity allow it
    pub spawn_chance: f64,
    /// Minimum time between two spawns
    pub respawn_delay_ms: u64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            min_distance: 2.0,
            max_distance: 8.0,
            max_concurrent_monsters: 6,
            spawn_chance: 0.35,
            respawn_delay_ms: 3_000,
        }
    }
}

impl SpawnConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.spawn_chance) {
            return Err(SimError::Configuration(format!(
                "spawn_chance ({}) must be within [0, 1]",
                self.spawn_chance
            )));
        }
        if self.min_distance < 0.0 || self.min_distance > self.max_distance {
            return Err(SimError::Configuration(format!(
                "spawn distance range [{}, {}] is invalid",
                self.min_distance, self.max_distance
            )));
        }
        Ok(())
    }
}

/// Weights for the per-actor utility heuristics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UtilityWeights {
    pub attack_base: f64,
    /// Maximum bonus for a close enemy
    pub attack_proximity: f64,
    /// Distance beyond which proximity contributes nothing
    pub distance_ceiling: f64,
    /// Maximum bonus for a weakened target
    pub attack_weakness: f64,
    /// Multiplier on (own hp ratio - 0.5)
    pub attack_self_health: f64,
    pub attack_ally_support: f64,
    pub attack_ally_support_cap: f64,

    pub move_base: f64,
    pub move_objective_value: f64,

    /// Own hp ratio below which the low-health retreat trigger fires
    pub retreat_health_threshold: f64,
    pub retreat_low_health: f64,
    /// Enemies-to-allies ratio above which the outnumbered trigger fires
    pub retreat_outnumbered_ratio: f64,
    pub retreat_outnumbered: f64,
    /// Fraction of max hp lost this tick that triggers burst retreat
    pub retreat_burst_fraction: f64,
    pub retreat_burst: f64,

    pub ability_area_per_enemy: f64,
    pub ability_area_cap: f64,
    pub ability_heal: f64,

    pub idle: f64,

    /// Radius used for ally/enemy counts around an actor
    pub awareness_radius: f64,
}

impl Default for UtilityWeights {
    fn default() -> Self {
        Self {
            attack_base: 0.5,
            attack_proximity: 0.3,
            distance_ceiling: 200.0,
            attack_weakness: 0.2,
            attack_self_health: 0.4,
            attack_ally_support: 0.05,
            attack_ally_support_cap: 0.15,

            move_base: 0.4,
            move_objective_value: 0.1,

            retreat_health_threshold: 0.3,
            retreat_low_health: 0.8,
            retreat_outnumbered_ratio: 1.5,
            retreat_outnumbered: 0.4,
            retreat_burst_fraction: 0.3,
            retreat_burst: 0.3,

            ability_area_per_enemy: 0.2,
            ability_area_cap: 1.0,
            ability_heal: 1.0,

            idle: 0.1,

            awareness_radius: 30.0,
        }
    }
}

/// Squad coordinator thresholds and formation geometry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SquadConfig {
    /// Own/enemy strength ratio above which the squad attacks
    pub attack_ratio: f64,
    /// Own/enemy strength ratio below which the squad retreats
    pub retreat_ratio: f64,
    /// Healthy members required before a flank is considered
    pub min_flank_members: usize,
    /// Hp ratio above which a member counts as healthy
    pub flank_health: f64,
    /// Distance between neighbours in the flank line
    pub line_spacing: f64,
    /// Perpendicular distance of the flank line from the target
    pub flank_offset: f64,
    /// Where a retreating squad regroups
    pub rally_point: Vec2,
    /// Enemies farther than this from the squad centroid are not visible
    pub vision_radius: f64,
}

impl Default for SquadConfig {
    fn default() -> Self {
        Self {
            attack_ratio: 1.5,
            retreat_ratio: 0.7,
            min_flank_members: 3,
            flank_health: 0.5,
            line_spacing: 2.0,
            flank_offset: 6.0,
            rally_point: Vec2::new(0.0, 0.0),
            vision_radius: 60.0,
        }
    }
}

/// Local strategic scoring weights used by the arbiter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyWeights {
    pub build_base: f64,
    /// Gold at which the build resource term saturates
    pub build_gold_saturation: f64,
    pub build_supply_pressure: f64,
    pub attack_base: f64,
    pub attack_advantage: f64,
    pub tech_base: f64,
    pub tech_gold_saturation: f64,
    pub tech_safety_bonus: f64,
    pub defend_base: f64,
    pub defend_threat: f64,
    pub expand_base: f64,
    pub expand_site_bonus: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            build_base: 0.3,
            build_gold_saturation: 500.0,
            build_supply_pressure: 0.2,
            attack_base: 0.4,
            attack_advantage: 0.5,
            tech_base: 0.2,
            tech_gold_saturation: 1000.0,
            tech_safety_bonus: 0.1,
            defend_base: 0.1,
            defend_threat: 0.5,
            expand_base: 0.2,
            expand_site_bonus: 0.3,
        }
    }
}

/// Hybrid decision arbiter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Ticks between two decisions
    pub decision_cooldown: u64,
    /// Decision records kept per faction
    pub history_capacity: usize,
    /// Top-2 margin, as a fraction of the top score, at or above which the
    /// local answer is trusted without asking the advisor
    pub margin_threshold: f64,
    pub advisory_timeout_ms: u64,
    /// Minimum confidence for a record to count as a highlight
    pub highlight_threshold: f64,
    pub weights: StrategyWeights,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            decision_cooldown: 10,
            history_capacity: 20,
            margin_threshold: 0.05,
            advisory_timeout_ms: 2_000,
            highlight_threshold: 0.6,
            weights: StrategyWeights::default(),
        }
    }
}

impl ArbiterConfig {
    pub fn advisory_timeout(&self) -> Duration {
        Duration::from_millis(self.advisory_timeout_ms)
    }
}

/// Replay pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    pub cache_capacity: usize,
    /// Hard bound on a whole generation, retries included
    pub generation_timeout_ms: u64,
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Share of ticks fully simulated in fast mode
    pub fast_mode_fraction: f64,
    pub engine_version: String,
    pub share_base_url: String,
    pub highlight_count: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 5,
            generation_timeout_ms: 30_000,
            max_attempts: 2,
            retry_backoff_ms: 250,
            fast_mode_fraction: 0.25,
            engine_version: concat!("skirmish-", env!("CARGO_PKG_VERSION")).to_string(),
            share_base_url: "https://replays.skirmish.local/r".to_string(),
            highlight_count: 5,
        }
    }
}

impl ReplayConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub spawn: SpawnConfig,
    pub utility: UtilityWeights,
    pub squad: SquadConfig,
    pub arbiter: ArbiterConfig,
    pub replay: ReplayConfig,
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text; missing sections take defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SimError::Configuration(format!("failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        self.spawn.validate()?;

        if self.squad.retreat_ratio >= self.squad.attack_ratio {
            return Err(SimError::Configuration(format!(
                "squad retreat_ratio ({}) should be < attack_ratio ({})",
                self.squad.retreat_ratio, self.squad.attack_ratio
            )));
        }

        if !(0.0..1.0).contains(&self.arbiter.margin_threshold) {
            return Err(SimError::Configuration(format!(
                "arbiter margin_threshold ({}) must be within [0, 1)",
                self.arbiter.margin_threshold
            )));
        }

        if self.arbiter.history_capacity == 0 || self.replay.cache_capacity == 0 {
            return Err(SimError::Configuration("capacities must be positive".into()));
        }

        if self.replay.max_attempts == 0 {
            return Err(SimError::Configuration("replay max_attempts must be >= 1".into()));
        }

        if !(0.0..=1.0).contains(&self.replay.fast_mode_fraction) {
            return Err(SimError::Configuration(format!(
                "fast_mode_fraction ({}) must be within [0, 1]",
                self.replay.fast_mode_fraction
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
            [spawn]
            spawn_chance = 0.9

            [arbiter]
            decision_cooldown = 3
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(config.spawn.spawn_chance, 0.9);
        assert_eq!(config.spawn.max_concurrent_monsters, 6);
        assert_eq!(config.arbiter.decision_cooldown, 3);
        assert_eq!(config.arbiter.history_capacity, 20);
        assert_eq!(config.replay.cache_capacity, 5);
    }

    #[test]
    fn test_invalid_spawn_chance_rejected() {
        let result = SimConfig::from_toml_str("[spawn]\nspawn_chance = 1.5\n");
        assert!(matches!(result, Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_inverted_squad_ratios_rejected() {
        let mut config = SimConfig::default();
        config.squad.retreat_ratio = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_checked_in_config() {
        let config = SimConfig::load("data/sim_config.toml").expect("should load data/sim_config.toml");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let result = SimConfig::load("data/does_not_exist.toml");
        assert!(matches!(result, Err(SimError::Configuration(_))));
    }
}
