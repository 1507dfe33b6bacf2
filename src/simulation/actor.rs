//! Actor data model: units, squad members and spawned creatures

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, FactionId, Vec2};
use crate::spawner::MonsterTier;

/// Kind of special ability an actor may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    /// Damages every enemy inside the radius
    AreaEffect,
    /// Restores the caster's own health
    Heal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub kind: AbilityKind,
    pub ready: bool,
    pub radius: f64,
    /// Damage dealt (area) or health restored (heal)
    pub power: f64,
    /// Ticks before the ability is ready again after use
    pub cooldown_ticks: u64,
    pub cooldown_remaining: u64,
}

impl Ability {
    pub fn new(kind: AbilityKind, radius: f64, power: f64, cooldown_ticks: u64) -> Self {
        Self {
            kind,
            ready: true,
            radius,
            power,
            cooldown_ticks,
            cooldown_remaining: 0,
        }
    }

    /// Mark used and start the cooldown
    pub fn trigger(&mut self) {
        self.ready = false;
        self.cooldown_remaining = self.cooldown_ticks;
    }

    /// Advance the cooldown by one tick
    pub fn recharge(&mut self) {
        if self.ready {
            return;
        }
        self.cooldown_remaining = self.cooldown_remaining.saturating_sub(1);
        if self.cooldown_remaining == 0 {
            self.ready = true;
        }
    }
}

/// Player-side unit classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitClass {
    Infantry,
    Archer,
    Mystic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "class")]
pub enum ActorKind {
    Unit(UnitClass),
    Monster(MonsterTier),
}

impl ActorKind {
    /// Short label used for unit-type counts in strategic snapshots
    pub fn label(&self) -> &'static str {
        match self {
            ActorKind::Unit(UnitClass::Infantry) => "infantry",
            ActorKind::Unit(UnitClass::Archer) => "archer",
            ActorKind::Unit(UnitClass::Mystic) => "mystic",
            ActorKind::Monster(tier) => tier.label(),
        }
    }
}

/// A unit or squad member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: EntityId,
    pub faction: FactionId,
    pub kind: ActorKind,
    pub position: Vec2,
    pub health: f64,
    pub max_health: f64,
    pub attack: f64,
    pub defense: f64,
    /// Distance covered per tick
    pub speed: f64,
    /// Reach of a basic attack
    pub range: f64,
    pub ability: Option<Ability>,
    /// Damage taken during the current tick; reset at tick start
    pub damage_this_turn: f64,
}

impl Actor {
    pub fn new(id: EntityId, faction: FactionId, kind: ActorKind, position: Vec2) -> Self {
        let (max_health, attack, defense, speed, range, ability) = match kind {
            ActorKind::Unit(UnitClass::Infantry) => (100.0, 12.0, 5.0, 1.5, 1.5, None),
            ActorKind::Unit(UnitClass::Archer) => (70.0, 9.0, 2.0, 1.5, 8.0, None),
            ActorKind::Unit(UnitClass::Mystic) => (
                60.0,
                6.0,
                2.0,
                1.2,
                4.0,
                Some(Ability::new(AbilityKind::Heal, 0.0, 25.0, 8)),
            ),
            ActorKind::Monster(tier) => {
                let stats = tier.stats();
                (
                    stats.max_health,
                    stats.attack,
                    stats.defense,
                    stats.speed,
                    1.5,
                    stats.ability.clone(),
                )
            }
        };

        Self {
            id,
            faction,
            kind,
            position,
            health: max_health,
            max_health,
            attack,
            defense,
            speed,
            range,
            ability,
            damage_this_turn: 0.0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn health_ratio(&self) -> f64 {
        if self.max_health <= 0.0 {
            return 0.0;
        }
        (self.health / self.max_health).clamp(0.0, 1.0)
    }

    /// Contribution to squad strength: attack scaled by remaining health
    pub fn strength(&self) -> f64 {
        if !self.is_alive() {
            return 0.0;
        }
        self.attack * self.health_ratio()
    }

    pub fn is_hostile_to(&self, other: &Actor) -> bool {
        self.faction != other.faction
    }

    pub fn ability_ready(&self) -> bool {
        self.ability.as_ref().is_some_and(|a| a.ready)
    }

    /// Apply incoming damage, clamping at zero
    pub fn take_damage(&mut self, amount: f64) {
        let dealt = amount.min(self.health).max(0.0);
        self.health -= dealt;
        self.damage_this_turn += dealt;
    }

    pub fn heal(&mut self, amount: f64) {
        self.health = (self.health + amount).min(self.max_health);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infantry() -> Actor {
        Actor::new(EntityId(1), FactionId(1), ActorKind::Unit(UnitClass::Infantry), Vec2::default())
    }

    #[test]
    fn test_damage_is_tracked_and_clamped() {
        let mut actor = infantry();
        actor.take_damage(30.0);
        assert_eq!(actor.health, 70.0);
        assert_eq!(actor.damage_this_turn, 30.0);

        actor.take_damage(500.0);
        assert_eq!(actor.health, 0.0);
        assert_eq!(actor.damage_this_turn, 100.0);
        assert!(!actor.is_alive());
        assert_eq!(actor.strength(), 0.0);
    }

    #[test]
    fn test_strength_scales_with_health() {
        let mut actor = infantry();
        assert_eq!(actor.strength(), 12.0);
        actor.take_damage(50.0);
        assert_eq!(actor.strength(), 6.0);
    }

    #[test]
    fn test_ability_cooldown() {
        let mut ability = Ability::new(AbilityKind::Heal, 0.0, 10.0, 2);
        ability.trigger();
        assert!(!ability.ready);
        ability.recharge();
        assert!(!ability.ready);
        ability.recharge();
        assert!(ability.ready);
    }

    #[test]
    fn test_labels() {
        assert_eq!(ActorKind::Unit(UnitClass::Archer).label(), "archer");
        assert_eq!(ActorKind::Monster(MonsterTier::Brute).label(), "brute");
    }
}
