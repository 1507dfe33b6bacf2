//! Read-only view of the simulation handed to decision components
//!
//! Scoring functions never touch mutable state: they receive a
//! `Battlefield` borrowed from the simulation and return intents.

use crate::core::types::{EntityId, Vec2};
use crate::simulation::actor::Actor;
use crate::simulation::state::Objective;

#[derive(Debug, Clone, Copy)]
pub struct Battlefield<'a> {
    actors: &'a [Actor],
    objectives: &'a [Objective],
}

impl<'a> Battlefield<'a> {
    pub fn new(actors: &'a [Actor], objectives: &'a [Objective]) -> Self {
        Self { actors, objectives }
    }

    pub fn actors(&self) -> &'a [Actor] {
        self.actors
    }

    pub fn objectives(&self) -> &'a [Objective] {
        self.objectives
    }

    pub fn get(&self, id: EntityId) -> Option<&'a Actor> {
        self.actors.iter().find(|a| a.id == id)
    }

    /// Living actors hostile to `actor`
    pub fn enemies_of(&self, actor: &'a Actor) -> impl Iterator<Item = &'a Actor> + 'a {
        self.actors
            .iter()
            .filter(move |other| other.is_alive() && actor.is_hostile_to(other))
    }

    /// Living friendly actors, excluding `actor` itself
    pub fn allies_of(&self, actor: &'a Actor) -> impl Iterator<Item = &'a Actor> + 'a {
        self.actors.iter().filter(move |other| {
            other.is_alive() && other.id != actor.id && other.faction == actor.faction
        })
    }

    /// Closest living enemy; ties broken by lowest id
    pub fn nearest_enemy(&self, actor: &'a Actor) -> Option<&'a Actor> {
        let mut best: Option<(&Actor, f64)> = None;
        for enemy in self.enemies_of(actor) {
            let d = actor.position.distance(&enemy.position);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((enemy, d));
            }
        }
        best.map(|(enemy, _)| enemy)
    }

    pub fn enemies_within(&self, actor: &'a Actor, center: Vec2, radius: f64) -> usize {
        self.enemies_of(actor)
            .filter(|e| e.position.distance(&center) <= radius)
            .count()
    }

    pub fn allies_within(&self, actor: &'a Actor, radius: f64) -> usize {
        self.allies_of(actor)
            .filter(|a| a.position.distance(&actor.position) <= radius)
            .count()
    }

    /// Objective with the lowest distance-to-value ratio from `from`
    pub fn best_objective(&self, from: Vec2) -> Option<&'a Objective> {
        let mut best: Option<(&Objective, f64)> = None;
        for objective in self.objectives.iter().filter(|o| o.value > 0.0) {
            let ratio = from.distance(&objective.position) / objective.value;
            if best.map_or(true, |(_, br)| ratio < br) {
                best = Some((objective, ratio));
            }
        }
        best.map(|(objective, _)| objective)
    }
}
