//! Headless match runner
//!
//! Runs a complete seeded skirmish between two AI factions plus spawned
//! creatures and records everything that happened as an action log.
//!
//! Per-tick order (fixed; replays depend on it):
//! 1. reset per-tick accumulators, recharge abilities, pay income
//! 2. spawner attempt
//! 3. squad coordinators
//! 4. utility engine for every living actor outside a squad, in ascending id
//! 5. apply intents in ascending actor id
//! 6. prune defeated actors
//! 7. arbiter invocation per AI faction
//!
//! Randomness comes from three streams derived from the match seed: the
//! spawner stream (the seed itself), the decision stream and the setup
//! stream (seed plus fixed offsets). Spawned creatures make their utility
//! draws on their own per-spawn streams instead of the decision stream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ai::squad::{SquadCoordinator, SquadState};
use crate::ai::utility::UtilityEngine;
use crate::arbiter::{DecisionRecord, HybridArbiter, StrategicOrder, StrategicSnapshot};
use crate::core::config::SimConfig;
use crate::core::rng::RandomStream;
use crate::core::types::{EntityId, FactionId, Seed, Tick, Vec2};
use crate::simulation::actor::{Actor, ActorKind, UnitClass};
use crate::simulation::intent::Intent;
use crate::simulation::state::{Objective, ResourceTotals, SimulationState};
use crate::spawner::{EntitySpawner, MonsterTier, SpawnOutcome};

/// Simulated milliseconds per tick
pub const TICK_MS: u64 = 100;
pub const DECISION_STREAM_OFFSET: Seed = 7_919;
pub const SETUP_STREAM_OFFSET: Seed = 104_729;

/// The squad-controlled faction
pub const BLUE: FactionId = FactionId(1);
/// The faction driven by per-actor utility scoring
pub const RED: FactionId = FactionId(2);

const STARTING_RESOURCES: ResourceTotals = ResourceTotals {
    gold: 50,
    supply_used: 0,
    supply_cap: 10,
};

const ROSTER: [UnitClass; 6] = [
    UnitClass::Infantry,
    UnitClass::Infantry,
    UnitClass::Infantry,
    UnitClass::Archer,
    UnitClass::Archer,
    UnitClass::Mystic,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    #[serde(rename = "type")]
    pub map_type: String,
    pub width: f64,
    pub height: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            map_type: "plains".into(),
            width: 100.0,
            height: 100.0,
        }
    }
}

impl MapConfig {
    pub fn new(map_type: impl Into<String>) -> Self {
        Self {
            map_type: map_type.into(),
            ..Self::default()
        }
    }
}

/// One line of the match action log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActionLogEntry {
    Spawn {
        tick: Tick,
        entity: EntityId,
        tier: MonsterTier,
    },
    Intent {
        tick: Tick,
        intent: Intent,
    },
    Squad {
        tick: Tick,
        faction: FactionId,
        state: SquadState,
    },
    Decision {
        tick: Tick,
        faction: FactionId,
        record: DecisionRecord,
    },
    Defeated {
        tick: Tick,
        entity: EntityId,
    },
}

impl ActionLogEntry {
    pub fn tick(&self) -> Tick {
        match self {
            ActionLogEntry::Spawn { tick, .. }
            | ActionLogEntry::Intent { tick, .. }
            | ActionLogEntry::Squad { tick, .. }
            | ActionLogEntry::Decision { tick, .. }
            | ActionLogEntry::Defeated { tick, .. } => *tick,
        }
    }
}

/// Result of a finished (or truncated) match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub seed: Seed,
    pub ticks_run: Tick,
    /// `None` while both sides still stand
    pub winner: Option<FactionId>,
    pub survivors: BTreeMap<FactionId, u32>,
    pub losses: BTreeMap<FactionId, u32>,
    pub spawned: u32,
    /// Confident decisions across all arbiters, by tick
    pub highlights: Vec<DecisionRecord>,
}

impl MatchOutcome {
    pub fn headline(&self) -> String {
        match self.winner {
            Some(f) => format!("Faction {} wins after {} ticks", f.0, self.ticks_run),
            None => format!("Undecided after {} ticks", self.ticks_run),
        }
    }
}

pub struct Match {
    seed: Seed,
    config: SimConfig,
    map: MapConfig,
    state: SimulationState,
    spawner: EntitySpawner,
    utility: UtilityEngine,
    decision_rng: RandomStream,
    squads: Vec<SquadCoordinator>,
    arbiters: Vec<HybridArbiter>,
    log: Vec<ActionLogEntry>,
}

impl Match {
    pub fn new(seed: Seed, map: MapConfig, config: SimConfig) -> Self {
        let mut setup = RandomStream::new(seed.wrapping_add(SETUP_STREAM_OFFSET));
        let mut state = SimulationState::new();
        state.add_faction(BLUE, STARTING_RESOURCES);
        state.add_faction(RED, STARTING_RESOURCES);

        let (w, h) = (map.width, map.height);
        let blue = deploy(&mut state, &mut setup, BLUE, w * 0.1, h);
        deploy(&mut state, &mut setup, RED, w * 0.9, h);

        state.objectives = vec![
            Objective {
                id: 1,
                position: Vec2::new(w * 0.5, h * 0.5),
                value: 0.8,
                feature: "resource_site".into(),
            },
            Objective {
                id: 2,
                position: Vec2::new(w * 0.25, h * 0.8),
                value: 0.4,
                feature: format!("{}_outpost", map.map_type),
            },
            Objective {
                id: 3,
                position: Vec2::new(w * 0.75, h * 0.2),
                value: 0.4,
                feature: format!("{}_outpost", map.map_type),
            },
        ];

        let spawn_points = vec![
            Vec2::new(w * 0.5, setup.float_range(h * 0.05, h * 0.15)),
            Vec2::new(w * 0.5, setup.float_range(h * 0.85, h * 0.95)),
        ];

        let mut squad_config = config.squad.clone();
        squad_config.rally_point = Vec2::new(w * 0.05, h * 0.5);

        Self {
            seed,
            spawner: EntitySpawner::new(config.spawn.clone(), spawn_points, seed),
            utility: UtilityEngine::new(config.utility.clone()),
            decision_rng: RandomStream::new(seed.wrapping_add(DECISION_STREAM_OFFSET)),
            squads: vec![SquadCoordinator::new(squad_config, BLUE, blue)],
            arbiters: vec![
                HybridArbiter::new(BLUE, config.arbiter.clone()),
                HybridArbiter::new(RED, config.arbiter.clone()),
            ],
            log: Vec::new(),
            state,
            map,
            config,
        }
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    pub fn map(&self) -> &MapConfig {
        &self.map
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn log(&self) -> &[ActionLogEntry] {
        &self.log
    }

    pub fn arbiters(&self) -> &[HybridArbiter] {
        &self.arbiters
    }

    pub fn spawner(&self) -> &EntitySpawner {
        &self.spawner
    }

    /// One side has no living units left
    pub fn is_decided(&self) -> bool {
        self.winner().is_some()
    }

    pub fn winner(&self) -> Option<FactionId> {
        match (self.state.living_count(BLUE), self.state.living_count(RED)) {
            (0, 0) => None,
            (0, _) => Some(RED),
            (_, 0) => Some(BLUE),
            _ => None,
        }
    }

    /// Advance one tick
    pub fn step(&mut self) {
        self.state.begin_tick(TICK_MS);
        let tick = self.state.tick;

        if let SpawnOutcome::Spawned(entity) = self.spawner.attempt_spawn(self.state.time_ms, &mut self.state) {
            if let Some(actor) = self.state.actor(entity) {
                if let ActorKind::Monster(tier) = actor.kind {
                    self.log.push(ActionLogEntry::Spawn { tick, entity, tier });
                }
            }
        }

        let mut intents = Vec::new();
        {
            let field = self.state.battlefield();
            for squad in &mut self.squads {
                let before = squad.state();
                intents.extend(squad.tick(&field, tick));
                if squad.state() != before {
                    self.log.push(ActionLogEntry::Squad {
                        tick,
                        faction: squad.faction(),
                        state: squad.state(),
                    });
                }
            }

            let squadded: Vec<EntityId> = self.squads.iter().flat_map(|s| s.members().iter().copied()).collect();
            let free: Vec<EntityId> = field
                .actors()
                .iter()
                .filter(|a| a.is_alive() && !squadded.contains(&a.id))
                .map(|a| a.id)
                .collect();
            // Spawned creatures jitter from their own per-spawn stream
            for id in free {
                let Some(actor) = field.get(id) else {
                    continue;
                };
                let rng = match self.spawner.stream_mut(id) {
                    Some(stream) => stream,
                    None => &mut self.decision_rng,
                };
                intents.extend(self.utility.decide(actor, &field, rng).intent);
            }
        }

        for intent in self.state.apply_all(intents) {
            self.log.push(ActionLogEntry::Intent { tick, intent });
        }

        let defeated = self.state.prune_defeated();
        for squad in &mut self.squads {
            squad.remove_members(&defeated);
        }
        for entity in defeated {
            self.log.push(ActionLogEntry::Defeated { tick, entity });
        }

        for i in 0..self.arbiters.len() {
            let faction = self.arbiters[i].faction();
            let snapshot = StrategicSnapshot::from_state(&self.state, faction);
            if let Some(record) = self.arbiters[i].tick(tick, &snapshot) {
                self.carry_out(faction, record.order, tick);
                self.log.push(ActionLogEntry::Decision { tick, faction, record });
            }
        }

        tracing::trace!(tick, actors = self.state.actors().len(), "tick complete");
    }

    /// Turn a strategic order into intents for the faction's units
    ///
    /// - `Build`: the first unit builds barracks
    /// - `Expand`: every unit gathers from every objective in reach
    /// - `Attack`: every unit advances on its nearest enemy
    /// - `Defend`: every unit closes ranks on the faction centroid
    /// - `Tech`: banks gold, no unit orders
    fn carry_out(&mut self, faction: FactionId, order: StrategicOrder, tick: Tick) {
        let intents: Vec<Intent> = {
            let field = self.state.battlefield();
            let own: Vec<&Actor> = field
                .actors()
                .iter()
                .filter(|a| a.faction == faction && a.is_alive())
                .collect();

            match order {
                StrategicOrder::Build => own
                    .first()
                    .map(|a| Intent::Build {
                        actor: a.id,
                        structure: "barracks".into(),
                        at: a.position,
                    })
                    .into_iter()
                    .collect(),
                StrategicOrder::Expand => own
                    .iter()
                    .flat_map(|a| {
                        field
                            .objectives()
                            .iter()
                            .map(move |site| Intent::Gather { actor: a.id, site: site.id })
                    })
                    .collect(),
                StrategicOrder::Attack => own
                    .iter()
                    .filter_map(|a| {
                        field.nearest_enemy(*a).map(|enemy| Intent::Move {
                            actor: a.id,
                            to: enemy.position,
                        })
                    })
                    .collect(),
                StrategicOrder::Defend => match Vec2::centroid(own.iter().map(|a| &a.position)) {
                    Some(centroid) => own
                        .iter()
                        .filter(|a| a.position != centroid)
                        .map(|a| Intent::Move { actor: a.id, to: centroid })
                        .collect(),
                    None => Vec::new(),
                },
                StrategicOrder::Tech => Vec::new(),
            }
        };

        for intent in self.state.apply_all(intents) {
            self.log.push(ActionLogEntry::Intent { tick, intent });
        }
    }

    /// Run up to `ticks` ticks, stopping early once a side is wiped out
    pub fn run(&mut self, ticks: Tick) -> MatchOutcome {
        for _ in 0..ticks {
            if self.is_decided() {
                break;
            }
            self.step();
        }
        let outcome = self.outcome();
        tracing::info!(
            seed = self.seed,
            ticks = outcome.ticks_run,
            winner = ?outcome.winner,
            log_len = self.log.len(),
            "match finished"
        );
        outcome
    }

    pub fn outcome(&self) -> MatchOutcome {
        let survivors = [BLUE, RED]
            .into_iter()
            .map(|f| (f, self.state.living_count(f) as u32))
            .collect();
        let losses = [BLUE, RED, FactionId::MONSTERS]
            .into_iter()
            .map(|f| (f, self.state.defeated_count(f)))
            .collect();

        let mut highlights: Vec<DecisionRecord> = self
            .arbiters
            .iter()
            .flat_map(|a| a.highlights(self.config.replay.highlight_count))
            .collect();
        highlights.sort_by_key(|r| r.tick);
        let excess = highlights.len().saturating_sub(self.config.replay.highlight_count);
        highlights.drain(..excess);

        MatchOutcome {
            seed: self.seed,
            ticks_run: self.state.tick,
            winner: self.winner(),
            survivors,
            losses,
            spawned: self.spawner.spawn_count(),
            highlights,
        }
    }

    /// Consume the match, keeping its log
    pub fn into_log(self) -> Vec<ActionLogEntry> {
        self.log
    }
}

/// Place the standard roster in a column around `x`
fn deploy(state: &mut SimulationState, setup: &mut RandomStream, faction: FactionId, x: f64, height: f64) -> Vec<EntityId> {
    ROSTER
        .iter()
        .map(|class| {
            let position = Vec2::new(
                x + setup.float_range(-2.0, 2.0),
                setup.float_range(height * 0.3, height * 0.7),
            );
            state.spawn_actor(faction, ActorKind::Unit(*class), position)
        })
        .collect()
}
