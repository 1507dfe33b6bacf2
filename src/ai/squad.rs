//! Squad coordinator
//!
//! Aggregates member strength against visible enemy strength into a
//! coarse state machine, then issues a fixed routine of intents per state:
//! - Idle: no visible enemies, no orders
//! - Attack: every member attacks the priority target
//! - Flank: members move into a line formation beside the target
//! - Hold: members gather on the squad centroid
//! - Retreat: members fall back to the rally point

use serde::{Deserialize, Serialize};

use crate::ai::context::Battlefield;
use crate::core::config::SquadConfig;
use crate::core::types::{EntityId, FactionId, Tick, Vec2};
use crate::simulation::actor::Actor;
use crate::simulation::intent::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SquadState {
    Idle,
    Hold,
    Attack,
    Flank,
    Retreat,
}

/// Sum of `attack * health_ratio` over living actors
pub fn combined_strength<'a>(actors: impl IntoIterator<Item = &'a Actor>) -> f64 {
    actors.into_iter().map(Actor::strength).sum()
}

#[derive(Debug, Clone)]
pub struct SquadCoordinator {
    config: SquadConfig,
    faction: FactionId,
    members: Vec<EntityId>,
    state: SquadState,
    last_transition_tick: Tick,
}

impl SquadCoordinator {
    pub fn new(config: SquadConfig, faction: FactionId, members: Vec<EntityId>) -> Self {
        let mut members = members;
        members.sort_unstable();
        members.dedup();
        Self {
            config,
            faction,
            members,
            state: SquadState::Idle,
            last_transition_tick: 0,
        }
    }

    pub fn state(&self) -> SquadState {
        self.state
    }

    pub fn faction(&self) -> FactionId {
        self.faction
    }

    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn last_transition_tick(&self) -> Tick {
        self.last_transition_tick
    }

    /// Drop members that no longer exist
    pub fn remove_members(&mut self, gone: &[EntityId]) {
        self.members.retain(|id| !gone.contains(id));
    }

    /// Re-evaluate the state machine, then issue the state's orders
    pub fn tick(&mut self, field: &Battlefield, tick: Tick) -> Vec<Intent> {
        self.evaluate(field, tick);
        self.issue_orders(field)
    }

    /// Apply the transition rule once; returns the (possibly new) state
    pub fn evaluate(&mut self, field: &Battlefield, tick: Tick) -> SquadState {
        let next = self.next_state(field);
        if next != self.state {
            tracing::debug!(
                faction = self.faction.0,
                from = ?self.state,
                to = ?next,
                tick,
                "squad state transition"
            );
            self.state = next;
            self.last_transition_tick = tick;
        }
        self.state
    }

    fn next_state(&self, field: &Battlefield) -> SquadState {
        let members = self.living_members(field);
        let enemies = self.visible_enemies(field, &members);
        if enemies.is_empty() {
            return SquadState::Idle;
        }

        let own = combined_strength(members.iter().copied());
        let enemy = combined_strength(enemies.iter().copied());

        if own > self.config.attack_ratio * enemy {
            SquadState::Attack
        } else if own < self.config.retreat_ratio * enemy {
            SquadState::Retreat
        } else if self.flank_opportunity(&members, own, enemy) {
            SquadState::Flank
        } else {
            SquadState::Hold
        }
    }

    /// Enough healthy members and not weaker than the opposition
    fn flank_opportunity(&self, members: &[&Actor], own: f64, enemy: f64) -> bool {
        let healthy = members
            .iter()
            .filter(|m| m.health_ratio() > self.config.flank_health)
            .count();
        healthy >= self.config.min_flank_members && own >= enemy
    }

    /// Orders for the current state
    pub fn issue_orders(&self, field: &Battlefield) -> Vec<Intent> {
        let members = self.living_members(field);
        if members.is_empty() {
            return Vec::new();
        }
        let enemies = self.visible_enemies(field, &members);
        let Some(centroid) = Vec2::centroid(members.iter().map(|m| &m.position)) else {
            return Vec::new();
        };

        match self.state {
            SquadState::Idle => Vec::new(),
            SquadState::Attack => match priority_target(&enemies) {
                Some(target) => members
                    .iter()
                    .map(|m| Intent::Attack { actor: m.id, target: target.id })
                    .collect(),
                None => Vec::new(),
            },
            SquadState::Retreat => members
                .iter()
                .map(|m| Intent::Retreat { actor: m.id, to: self.config.rally_point })
                .collect(),
            SquadState::Hold => members
                .iter()
                .map(|m| Intent::Move { actor: m.id, to: centroid })
                .collect(),
            SquadState::Flank => match priority_target(&enemies) {
                Some(target) => self
                    .flank_positions(centroid, target.position, members.len())
                    .into_iter()
                    .zip(members.iter())
                    .map(|(to, m)| Intent::Move { actor: m.id, to })
                    .collect(),
                None => Vec::new(),
            },
        }
    }

    /// Line formation parallel to the approach axis, offset to the side of the target
    pub fn flank_positions(&self, centroid: Vec2, target: Vec2, count: usize) -> Vec<Vec2> {
        let axis = (target - centroid).normalize();
        let side = axis.perpendicular();
        let anchor = target + side * self.config.flank_offset;
        let middle = (count as f64 - 1.0) / 2.0;

        (0..count)
            .map(|i| anchor + axis * ((i as f64 - middle) * self.config.line_spacing))
            .collect()
    }

    fn living_members<'a>(&self, field: &Battlefield<'a>) -> Vec<&'a Actor> {
        self.members
            .iter()
            .filter_map(|id| field.get(*id))
            .filter(|a| a.is_alive())
            .collect()
    }

    fn visible_enemies<'a>(&self, field: &Battlefield<'a>, members: &[&'a Actor]) -> Vec<&'a Actor> {
        let Some(centroid) = Vec2::centroid(members.iter().map(|m| &m.position)) else {
            return Vec::new();
        };
        field
            .actors()
            .iter()
            .filter(|a| a.is_alive() && a.faction != self.faction)
            .filter(|a| a.position.distance(&centroid) <= self.config.vision_radius)
            .collect()
    }
}

/// Weakest visible enemy by health ratio; ties go to the lowest id
fn priority_target<'a>(enemies: &[&'a Actor]) -> Option<&'a Actor> {
    let mut best: Option<&'a Actor> = None;
    for enemy in enemies {
        match best {
            Some(b) if enemy.health_ratio() >= b.health_ratio() => {}
            _ => best = Some(*enemy),
        }
    }
    best
}
