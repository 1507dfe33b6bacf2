//! Simulation state: owns actors, objectives and faction economies
//!
//! Decision components read it through [`Battlefield`] and hand back
//! [`Intent`]s; only this module mutates actors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ai::context::Battlefield;
use crate::core::types::{EntityId, FactionId, Tick, Vec2};
use crate::simulation::actor::{AbilityKind, Actor, ActorKind};
use crate::simulation::intent::Intent;
use crate::spawner::EntityRegistry;

/// Gold granted to every faction each tick
const PASSIVE_INCOME: u32 = 1;
/// Cost of a `Build` intent
const BUILD_COST: u32 = 100;
/// Supply added by a completed build
const BUILD_SUPPLY: u32 = 5;
/// How close an actor must stand to an objective to gather from it
const GATHER_RADIUS: f64 = 2.0;

/// A map objective: a resource site or strategic point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: u32,
    pub position: Vec2,
    /// Relative worth in `[0, 1]`
    pub value: f64,
    /// Coarse map-feature tag reported in strategic snapshots
    pub feature: String,
}

/// Per-faction resource totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTotals {
    pub gold: u32,
    pub supply_used: u32,
    pub supply_cap: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    pub tick: Tick,
    pub time_ms: u64,
    /// Sorted by id; ids are allocated monotonically
    actors: Vec<Actor>,
    pub objectives: Vec<Objective>,
    resources: BTreeMap<FactionId, ResourceTotals>,
    defeated: BTreeMap<FactionId, u32>,
    next_id: u32,
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a faction with starting resources
    pub fn add_faction(&mut self, faction: FactionId, resources: ResourceTotals) {
        self.resources.insert(faction, resources);
    }

    /// Allocate an id and insert a fresh actor of `kind`
    pub fn spawn_actor(&mut self, faction: FactionId, kind: ActorKind, position: Vec2) -> EntityId {
        let id = self.allocate_id();
        self.register(Actor::new(id, faction, kind, position));
        id
    }

    pub fn actor(&self, id: EntityId) -> Option<&Actor> {
        self.index_of(id).map(|idx| &self.actors[idx])
    }

    pub fn actor_mut(&mut self, id: EntityId) -> Option<&mut Actor> {
        self.index_of(id).map(move |idx| &mut self.actors[idx])
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    /// Immutable view handed to decision components
    pub fn battlefield(&self) -> Battlefield<'_> {
        Battlefield::new(&self.actors, &self.objectives)
    }

    pub fn resources(&self, faction: FactionId) -> ResourceTotals {
        let mut totals = self.resources.get(&faction).copied().unwrap_or_default();
        totals.supply_used = self.living_count(faction) as u32;
        totals
    }

    pub fn factions(&self) -> impl Iterator<Item = FactionId> + '_ {
        self.resources.keys().copied()
    }

    pub fn living_count(&self, faction: FactionId) -> usize {
        self.actors
            .iter()
            .filter(|a| a.faction == faction && a.is_alive())
            .count()
    }

    pub fn defeated_count(&self, faction: FactionId) -> u32 {
        self.defeated.get(&faction).copied().unwrap_or(0)
    }

    /// Start a new tick: clear per-tick accumulators, recharge abilities,
    /// pay passive income
    pub fn begin_tick(&mut self, tick_ms: u64) {
        self.tick += 1;
        self.time_ms += tick_ms;

        for actor in &mut self.actors {
            actor.damage_this_turn = 0.0;
            if let Some(ability) = actor.ability.as_mut() {
                ability.recharge();
            }
        }

        for totals in self.resources.values_mut() {
            totals.gold = totals.gold.saturating_add(PASSIVE_INCOME);
        }
    }

    /// Apply intents in ascending actor id order (stable for equal ids)
    pub fn apply_all(&mut self, mut intents: Vec<Intent>) -> Vec<Intent> {
        intents.sort_by_key(|i| i.actor());
        intents.into_iter().filter(|i| self.apply(i)).collect()
    }

    /// Apply one intent; returns false when it had no effect
    pub fn apply(&mut self, intent: &Intent) -> bool {
        let Some(actor) = self.actor(intent.actor()) else {
            return false;
        };
        if !actor.is_alive() {
            return false;
        }
        let (origin, speed, range, attack, faction) =
            (actor.position, actor.speed, actor.range, actor.attack, actor.faction);

        match intent {
            Intent::Move { actor, to } | Intent::Retreat { actor, to } => {
                if let Some(a) = self.actor_mut(*actor) {
                    a.position = origin.step_towards(to, speed);
                }
                true
            }
            Intent::Attack { actor, target } => {
                let Some(defender) = self.actor(*target).filter(|t| t.is_alive()) else {
                    return false;
                };
                let target_pos = defender.position;
                if origin.distance(&target_pos) <= range {
                    let damage = (attack - defender.defense).max(1.0);
                    if let Some(d) = self.actor_mut(*target) {
                        d.take_damage(damage);
                    }
                } else if let Some(a) = self.actor_mut(*actor) {
                    a.position = origin.step_towards(&target_pos, speed);
                }
                true
            }
            Intent::UseAbility { actor, at } => self.use_ability(*actor, *at),
            Intent::Gather { site, .. } => {
                let Some(objective) = self.objectives.iter().find(|o| o.id == *site) else {
                    return false;
                };
                if origin.distance(&objective.position) > GATHER_RADIUS {
                    return false;
                }
                let income = (objective.value * 10.0).round() as u32;
                let totals = self.resources.entry(faction).or_default();
                totals.gold = totals.gold.saturating_add(income);
                true
            }
            Intent::Build { structure, .. } => {
                let totals = self.resources.entry(faction).or_default();
                if totals.gold < BUILD_COST {
                    return false;
                }
                totals.gold -= BUILD_COST;
                totals.supply_cap += BUILD_SUPPLY;
                tracing::debug!(faction = faction.0, structure = %structure, "structure built");
                true
            }
        }
    }

    fn use_ability(&mut self, caster: EntityId, at: Vec2) -> bool {
        let Some(actor) = self.actor(caster) else {
            return false;
        };
        let Some(ability) = actor.ability.clone().filter(|a| a.ready) else {
            return false;
        };
        let faction = actor.faction;

        match ability.kind {
            AbilityKind::AreaEffect => {
                for target in self.actors.iter_mut() {
                    if target.faction != faction
                        && target.is_alive()
                        && target.position.distance(&at) <= ability.radius
                    {
                        target.take_damage(ability.power);
                    }
                }
            }
            AbilityKind::Heal => {
                if let Some(a) = self.actor_mut(caster) {
                    a.heal(ability.power);
                }
            }
        }

        if let Some(a) = self.actor_mut(caster).and_then(|a| a.ability.as_mut()) {
            a.trigger();
        }
        true
    }

    /// Remove defeated actors, returning their ids in ascending order
    pub fn prune_defeated(&mut self) -> Vec<EntityId> {
        let mut removed = Vec::new();
        let defeated = &mut self.defeated;
        self.actors.retain(|a| {
            if a.is_alive() {
                true
            } else {
                *defeated.entry(a.faction).or_insert(0) += 1;
                removed.push(a.id);
                false
            }
        });
        removed
    }

    fn index_of(&self, id: EntityId) -> Option<usize> {
        self.actors.binary_search_by_key(&id, |a| a.id).ok()
    }
}

impl EntityRegistry for SimulationState {
    fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    fn register(&mut self, actor: Actor) {
        debug_assert!(
            self.actors.last().map_or(true, |last| last.id < actor.id),
            "actors must be registered in ascending id order"
        );
        self.actors.push(actor);
    }

    fn is_alive(&self, id: EntityId) -> bool {
        self.actor(id).is_some_and(|a| a.is_alive())
    }

    fn remove(&mut self, id: EntityId) {
        if let Some(idx) = self.index_of(id) {
            self.actors.remove(idx);
        }
    }
}
