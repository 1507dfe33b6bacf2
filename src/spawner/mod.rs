//! Entity spawner
//!
//! Periodically introduces hostile creatures using seed-derived choices,
//! gated by a cooldown, a concurrency cap and a spawn chance.
//!
//! Per-attempt draw order on the spawner stream: one chance draw; on
//! acceptance one spawn-point `choice` and one tier draw. Placement around
//! the point is drawn from the new entity's own per-spawn stream, so the
//! spawner stream never depends on placement. The entity keeps that stream
//! for its later decisions (see [`EntitySpawner::stream_mut`]).

mod tiers;

pub use tiers::{MonsterTier, TierStats, TierTable};

use std::f64::consts::TAU;

use crate::core::config::SpawnConfig;
use crate::core::rng::RandomStream;
use crate::core::types::{EntityId, FactionId, Seed, Vec2};
use crate::simulation::actor::{Actor, ActorKind};

/// Where spawned entities are created and tracked
pub trait EntityRegistry {
    fn allocate_id(&mut self) -> EntityId;
    fn register(&mut self, actor: Actor);
    fn is_alive(&self, id: EntityId) -> bool;
    fn remove(&mut self, id: EntityId);
}

/// Seed for the `spawn_index`-th entity spawned at `time_ms`
pub fn per_spawn_seed(global_seed: Seed, spawn_index: u32, time_ms: u64) -> Seed {
    global_seed
        .wrapping_add(spawn_index.wrapping_mul(1000))
        .wrapping_add((time_ms / 1000) as u32)
}

/// Record of one spawned entity
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedEntity {
    pub id: EntityId,
    pub tier: MonsterTier,
    pub spawn_index: u32,
    pub seed: Seed,
    pub spawned_at_ms: u64,
    /// The entity's own stream: two placement draws, then every draw its
    /// decisions make
    pub stream: RandomStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnRejection {
    /// Misconfigured or no spawn points: the spawner never spawns
    Disabled,
    Cooldown,
    AtCapacity,
    ChanceRoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned(EntityId),
    Rejected(SpawnRejection),
}

impl SpawnOutcome {
    pub fn spawned(&self) -> Option<EntityId> {
        match self {
            SpawnOutcome::Spawned(id) => Some(*id),
            SpawnOutcome::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntitySpawner {
    config: SpawnConfig,
    points: Vec<Vec2>,
    table: TierTable,
    global_seed: Seed,
    rng: RandomStream,
    last_spawn_ms: Option<u64>,
    spawn_count: u32,
    spawned: Vec<SpawnedEntity>,
    disabled: bool,
}

impl EntitySpawner {
    /// Create a spawner; configuration problems are logged once and leave
    /// the spawner as a permanent no-op
    pub fn new(config: SpawnConfig, points: Vec<Vec2>, global_seed: Seed) -> Self {
        let disabled = match config.validate() {
            Err(e) => {
                tracing::warn!(error = %e, "spawner disabled by invalid configuration");
                true
            }
            Ok(()) if points.is_empty() => {
                tracing::warn!("spawner has no spawn points configured; spawning disabled");
                true
            }
            Ok(()) => false,
        };

        Self {
            config,
            points,
            table: TierTable::default(),
            global_seed,
            rng: RandomStream::new(global_seed),
            last_spawn_ms: None,
            spawn_count: 0,
            spawned: Vec::new(),
            disabled,
        }
    }

    pub fn with_table(mut self, table: TierTable) -> Self {
        self.table = table;
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn spawn_count(&self) -> u32 {
        self.spawn_count
    }

    pub fn last_spawn_ms(&self) -> Option<u64> {
        self.last_spawn_ms
    }

    /// Run the gating checks and, if they pass, spawn one entity
    pub fn attempt_spawn<R: EntityRegistry>(&mut self, now_ms: u64, registry: &mut R) -> SpawnOutcome {
        if self.disabled {
            return SpawnOutcome::Rejected(SpawnRejection::Disabled);
        }

        if let Some(last) = self.last_spawn_ms {
            if now_ms.saturating_sub(last) < self.config.respawn_delay_ms {
                return SpawnOutcome::Rejected(SpawnRejection::Cooldown);
            }
        }

        self.spawned.retain(|e| registry.is_alive(e.id));
        if self.spawned.len() >= self.config.max_concurrent_monsters {
            return SpawnOutcome::Rejected(SpawnRejection::AtCapacity);
        }

        if self.rng.next() >= self.config.spawn_chance {
            return SpawnOutcome::Rejected(SpawnRejection::ChanceRoll);
        }

        let Some(point) = self.rng.choice(&self.points).copied() else {
            return SpawnOutcome::Rejected(SpawnRejection::Disabled);
        };
        let tier = self.table.pick(self.rng.next());

        let seed = per_spawn_seed(self.global_seed, self.spawn_count, now_ms);
        let mut stream = RandomStream::new(seed);
        let angle = stream.float_range(0.0, TAU);
        let radius = stream.float_range(self.config.min_distance, self.config.max_distance);
        let position = point + Vec2::new(angle.cos(), angle.sin()) * radius;

        let id = registry.allocate_id();
        registry.register(Actor::new(id, FactionId::MONSTERS, ActorKind::Monster(tier), position));

        tracing::info!(
            entity = %id,
            tier = tier.label(),
            spawn_index = self.spawn_count,
            seed,
            "spawned entity"
        );

        self.spawned.push(SpawnedEntity {
            id,
            tier,
            spawn_index: self.spawn_count,
            seed,
            spawned_at_ms: now_ms,
            stream,
        });
        self.last_spawn_ms = Some(now_ms);
        self.spawn_count += 1;

        SpawnOutcome::Spawned(id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&SpawnedEntity> {
        self.spawned.iter().find(|e| e.id == id)
    }

    /// Per-spawn stream of a tracked entity, for draws made on its behalf
    pub fn stream_mut(&mut self, id: EntityId) -> Option<&mut RandomStream> {
        self.spawned.iter_mut().find(|e| e.id == id).map(|e| &mut e.stream)
    }

    /// Live, non-defeated spawned entities
    pub fn active_entities<R: EntityRegistry>(&self, registry: &R) -> Vec<&SpawnedEntity> {
        self.spawned.iter().filter(|e| registry.is_alive(e.id)).collect()
    }

    /// Remove every spawned entity and rewind to the initial seed
    pub fn clear_all<R: EntityRegistry>(&mut self, registry: &mut R) {
        for entity in self.spawned.drain(..) {
            registry.remove(entity.id);
        }
        self.rng.reset();
        self.last_spawn_ms = None;
        self.spawn_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::state::SimulationState;
    use proptest::prelude::*;

    fn eager_config() -> SpawnConfig {
        SpawnConfig {
            spawn_chance: 1.0,
            respawn_delay_ms: 1_000,
            max_concurrent_monsters: 3,
            ..SpawnConfig::default()
        }
    }

    fn points() -> Vec<Vec2> {
        vec![Vec2::new(0.0, 0.0), Vec2::new(50.0, 50.0), Vec2::new(-50.0, 20.0)]
    }

    #[test]
    fn test_no_spawn_points_is_noop() {
        let mut state = SimulationState::new();
        let mut spawner = EntitySpawner::new(eager_config(), Vec::new(), 1);
        assert!(spawner.is_disabled());
        assert_eq!(
            spawner.attempt_spawn(10_000, &mut state),
            SpawnOutcome::Rejected(SpawnRejection::Disabled)
        );
        assert!(state.actors().is_empty());
    }

    #[test]
    fn test_invalid_config_is_noop() {
        let config = SpawnConfig {
            spawn_chance: 2.0,
            ..SpawnConfig::default()
        };
        let spawner = EntitySpawner::new(config, points(), 1);
        assert!(spawner.is_disabled());
    }

    #[test]
    fn test_cooldown_and_capacity() {
        let mut state = SimulationState::new();
        let mut spawner = EntitySpawner::new(eager_config(), points(), 42);

        assert!(spawner.attempt_spawn(0, &mut state).spawned().is_some());
        assert_eq!(
            spawner.attempt_spawn(500, &mut state),
            SpawnOutcome::Rejected(SpawnRejection::Cooldown)
        );
        assert!(spawner.attempt_spawn(1_000, &mut state).spawned().is_some());
        assert!(spawner.attempt_spawn(2_000, &mut state).spawned().is_some());
        assert_eq!(
            spawner.attempt_spawn(3_000, &mut state),
            SpawnOutcome::Rejected(SpawnRejection::AtCapacity)
        );
        assert_eq!(spawner.active_entities(&state).len(), 3);

        // Killing one frees a slot
        let victim = spawner.active_entities(&state)[0].id;
        state.actor_mut(victim).unwrap().take_damage(10_000.0);
        assert!(spawner.attempt_spawn(4_000, &mut state).spawned().is_some());
        assert_eq!(spawner.active_entities(&state).len(), 3);
    }

    #[test]
    fn test_zero_chance_never_spawns() {
        let mut state = SimulationState::new();
        let config = SpawnConfig {
            spawn_chance: 0.0,
            ..eager_config()
        };
        let mut spawner = EntitySpawner::new(config, points(), 3);
        for t in 0..20 {
            assert_eq!(
                spawner.attempt_spawn(t * 10_000, &mut state),
                SpawnOutcome::Rejected(SpawnRejection::ChanceRoll)
            );
        }
    }

    #[test]
    fn test_per_spawn_seed_formula() {
        assert_eq!(per_spawn_seed(100, 0, 999), 100);
        assert_eq!(per_spawn_seed(100, 2, 5_500), 100 + 2_000 + 5);
        assert_eq!(per_spawn_seed(u32::MAX, 1, 0), 999);
    }

    #[test]
    fn test_placement_within_distance_band() {
        let mut state = SimulationState::new();
        let mut spawner = EntitySpawner::new(eager_config(), vec![Vec2::new(10.0, 10.0)], 77);
        let id = spawner.attempt_spawn(0, &mut state).spawned().unwrap();
        let d = state.actor(id).unwrap().position.distance(&Vec2::new(10.0, 10.0));
        assert!((2.0..=8.0).contains(&d), "distance {}", d);
    }

    #[test]
    fn test_entity_stream_continues_after_placement() {
        let mut state = SimulationState::new();
        let mut spawner = EntitySpawner::new(eager_config(), points(), 21);
        let id = spawner.attempt_spawn(4_000, &mut state).spawned().unwrap();
        let seed = spawner.entity(id).unwrap().seed;

        let mut expected = RandomStream::new(seed);
        expected.next();
        expected.next();
        let stream = spawner.stream_mut(id).unwrap();
        assert_eq!(*stream, expected);
        assert_eq!(stream.next().to_bits(), expected.next().to_bits());

        assert!(spawner.stream_mut(EntityId(9_999)).is_none());
    }

    #[test]
    fn test_clear_all_replays_identically() {
        let mut state = SimulationState::new();
        let mut spawner = EntitySpawner::new(eager_config(), points(), 9);
        for t in 0..3 {
            spawner.attempt_spawn(t * 1_000, &mut state);
        }
        let first: Vec<(MonsterTier, Seed)> =
            spawner.active_entities(&state).iter().map(|e| (e.tier, e.seed)).collect();
        assert_eq!(first.len(), 3);

        spawner.clear_all(&mut state);
        assert!(state.actors().is_empty());
        assert_eq!(spawner.spawn_count(), 0);

        for t in 0..3 {
            spawner.attempt_spawn(t * 1_000, &mut state);
        }
        let second: Vec<(MonsterTier, Seed)> =
            spawner.active_entities(&state).iter().map(|e| (e.tier, e.seed)).collect();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_capacity_never_exceeded(seed in any::<u32>(), cap in 0usize..5, ticks in 1u64..60) {
            let mut state = SimulationState::new();
            let config = SpawnConfig {
                spawn_chance: 0.8,
                respawn_delay_ms: 100,
                max_concurrent_monsters: cap,
                ..SpawnConfig::default()
            };
            let mut spawner = EntitySpawner::new(config, points(), seed);
            for t in 0..ticks {
                let before = spawner.active_entities(&state).len();
                let outcome = spawner.attempt_spawn(t * 250, &mut state);
                let after = spawner.active_entities(&state).len();
                if before >= cap {
                    prop_assert_eq!(after, before);
                    prop_assert!(outcome.spawned().is_none());
                }
                prop_assert!(after <= cap);
            }
        }

        #[test]
        fn prop_tier_sequence_reproducible(seed in any::<u32>()) {
            let run = |seed: u32| {
                let mut state = SimulationState::new();
                let config = SpawnConfig {
                    spawn_chance: 0.6,
                    respawn_delay_ms: 0,
                    max_concurrent_monsters: 100,
                    ..SpawnConfig::default()
                };
                let mut spawner = EntitySpawner::new(config, points(), seed);
                for t in 0..40u64 {
                    spawner.attempt_spawn(t * 1_000, &mut state);
                }
                spawner
                    .active_entities(&state)
                    .iter()
                    .map(|e| (e.tier, e.seed, state.actor(e.id).map(|a| a.position)))
                    .collect::<Vec<_>>()
            };
            prop_assert_eq!(run(seed), run(seed));
        }
    }
}
