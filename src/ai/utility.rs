//! Utility decision engine
//!
//! Every decision tick each actor scores the five fixed actions with
//! independent heuristics, perturbs the scores with a small seeded
//! jitter, and returns the best one as an intent. Nothing here mutates
//! simulation state.
//!
//! Random draw order: actors in ascending id, then exactly five draws per
//! actor in [`ActionType::ALL`] order (attack, move, retreat, ability,
//! idle). Replays depend on this order.

use serde::{Deserialize, Serialize};

use crate::ai::context::Battlefield;
use crate::core::config::UtilityWeights;
use crate::core::rng::RandomStream;
use crate::core::types::{EntityId, Vec2};
use crate::simulation::actor::{AbilityKind, Actor};
use crate::simulation::intent::Intent;

/// Half-width of the symmetric jitter added to each raw score
pub const SCORE_PERTURBATION: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Attack,
    Move,
    Retreat,
    Ability,
    Idle,
}

impl ActionType {
    /// Fixed scoring and draw order
    pub const ALL: [ActionType; 5] = [
        ActionType::Attack,
        ActionType::Move,
        ActionType::Retreat,
        ActionType::Ability,
        ActionType::Idle,
    ];
}

/// Ephemeral scored action, recomputed every decision tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub action: ActionType,
    pub score: f64,
}

/// Outcome of scoring one actor
#[derive(Debug, Clone, PartialEq)]
pub struct UtilityDecision {
    pub actor: EntityId,
    pub chosen: ActionCandidate,
    /// Perturbed scores in [`ActionType::ALL`] order
    pub candidates: [ActionCandidate; 5],
    /// `None` when idling
    pub intent: Option<Intent>,
}

#[derive(Debug, Clone, Default)]
pub struct UtilityEngine {
    weights: UtilityWeights,
}

impl UtilityEngine {
    pub fn new(weights: UtilityWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &UtilityWeights {
        &self.weights
    }

    /// Unperturbed scores in [`ActionType::ALL`] order
    pub fn raw_scores(&self, actor: &Actor, field: &Battlefield) -> [ActionCandidate; 5] {
        ActionType::ALL.map(|action| ActionCandidate {
            action,
            score: match action {
                ActionType::Attack => self.attack_score(actor, field),
                ActionType::Move => self.move_score(actor, field),
                ActionType::Retreat => self.retreat_score(actor, field),
                ActionType::Ability => self.ability_score(actor, field),
                ActionType::Idle => self.weights.idle,
            },
        })
    }

    /// Score, perturb and pick the best action for one actor
    pub fn decide(&self, actor: &Actor, field: &Battlefield, rng: &mut RandomStream) -> UtilityDecision {
        let mut candidates = self.raw_scores(actor, field);
        for candidate in candidates.iter_mut() {
            candidate.score += rng.perturbation(SCORE_PERTURBATION);
        }

        // Strict comparison: an exact tie after jitter keeps the earlier action
        let mut chosen = candidates[0];
        for candidate in &candidates[1..] {
            if candidate.score > chosen.score {
                chosen = *candidate;
            }
        }

        debug_assert!(chosen.score.is_finite(), "non-finite utility score for {}", actor.id);

        UtilityDecision {
            actor: actor.id,
            chosen,
            candidates,
            intent: self.intent_for(chosen.action, actor, field),
        }
    }

    /// Decide for every listed actor, in ascending id order
    pub fn decide_all(
        &self,
        field: &Battlefield,
        actors: &[EntityId],
        rng: &mut RandomStream,
    ) -> Vec<UtilityDecision> {
        let mut ids = actors.to_vec();
        ids.sort_unstable();
        ids.dedup();

        ids.into_iter()
            .filter_map(|id| field.get(id).filter(|a| a.is_alive()))
            .map(|actor| self.decide(actor, field, rng))
            .collect()
    }

    fn proximity(&self, distance: f64) -> f64 {
        let ceiling = self.weights.distance_ceiling.max(f64::EPSILON);
        1.0 - distance.min(ceiling) / ceiling
    }

    fn attack_score(&self, actor: &Actor, field: &Battlefield) -> f64 {
        let w = &self.weights;
        let Some(enemy) = field.nearest_enemy(actor) else {
            return 0.0;
        };

        let distance = actor.position.distance(&enemy.position);
        let allies = field.allies_within(actor, w.awareness_radius) as f64;

        w.attack_base
            + self.proximity(distance) * w.attack_proximity
            + (1.0 - enemy.health_ratio()) * w.attack_weakness
            + (actor.health_ratio() - 0.5) * w.attack_self_health
            + (allies * w.attack_ally_support).min(w.attack_ally_support_cap)
    }

    fn move_score(&self, actor: &Actor, field: &Battlefield) -> f64 {
        let w = &self.weights;
        match field.best_objective(actor.position) {
            Some(objective) => {
                let distance = actor.position.distance(&objective.position);
                w.move_base * self.proximity(distance) + objective.value * w.move_objective_value
            }
            None => 0.0,
        }
    }

    fn retreat_score(&self, actor: &Actor, field: &Battlefield) -> f64 {
        let w = &self.weights;
        let mut score = 0.0;

        if actor.health_ratio() < w.retreat_health_threshold {
            score += w.retreat_low_health;
        }

        let enemies = field.enemies_within(actor, actor.position, w.awareness_radius) as f64;
        let allies = field.allies_within(actor, w.awareness_radius) as f64;
        if enemies > w.retreat_outnumbered_ratio * allies {
            score += w.retreat_outnumbered;
        }

        if actor.damage_this_turn > w.retreat_burst_fraction * actor.max_health {
            score += w.retreat_burst;
        }

        score
    }

    fn ability_score(&self, actor: &Actor, field: &Battlefield) -> f64 {
        let w = &self.weights;
        let Some(ability) = actor.ability.as_ref().filter(|a| a.ready) else {
            return 0.0;
        };

        match ability.kind {
            AbilityKind::AreaEffect => {
                let in_radius = field.enemies_within(actor, actor.position, ability.radius) as f64;
                (in_radius * w.ability_area_per_enemy).min(w.ability_area_cap)
            }
            AbilityKind::Heal => (1.0 - actor.health_ratio()) * w.ability_heal,
        }
    }

    fn intent_for(&self, action: ActionType, actor: &Actor, field: &Battlefield) -> Option<Intent> {
        match action {
            ActionType::Attack => field.nearest_enemy(actor).map(|enemy| Intent::Attack {
                actor: actor.id,
                target: enemy.id,
            }),
            ActionType::Move => field.best_objective(actor.position).map(|objective| Intent::Move {
                actor: actor.id,
                to: objective.position,
            }),
            ActionType::Retreat => Some(Intent::Retreat {
                actor: actor.id,
                to: self.retreat_destination(actor, field),
            }),
            // Area abilities are scored around the caster, heals target the caster
            ActionType::Ability => Some(Intent::UseAbility {
                actor: actor.id,
                at: actor.position,
            }),
            ActionType::Idle => None,
        }
    }

    /// Point away from the local enemy centroid, half an awareness radius out
    fn retreat_destination(&self, actor: &Actor, field: &Battlefield) -> Vec2 {
        let radius = self.weights.awareness_radius;
        let threats: Vec<Vec2> = field
            .enemies_of(actor)
            .filter(|e| e.position.distance(&actor.position) <= radius)
            .map(|e| e.position)
            .collect();

        match Vec2::centroid(threats.iter()) {
            Some(threat_center) => {
                let away = (actor.position - threat_center).normalize();
                actor.position + away * (radius * 0.5)
            }
            None => actor.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FactionId;
    use crate::simulation::actor::{Ability, ActorKind, UnitClass};
    use crate::simulation::state::Objective;
    use crate::spawner::MonsterTier;

    fn unit(id: u32, faction: u8, x: f64, y: f64) -> Actor {
        Actor::new(
            EntityId(id),
            FactionId(faction),
            ActorKind::Unit(UnitClass::Infantry),
            Vec2::new(x, y),
        )
    }

    #[test]
    fn test_wounded_and_surrounded_actor_retreats() {
        let mut hero = unit(1, 1, 0.0, 0.0);
        hero.health = hero.max_health * 0.1;
        let actors = vec![
            hero,
            unit(2, 2, 2.0, 0.0),
            unit(3, 2, -2.0, 0.0),
            unit(4, 2, 0.0, 2.0),
        ];
        let field = Battlefield::new(&actors, &[]);
        let engine = UtilityEngine::default();

        for seed in 0..50 {
            let mut rng = RandomStream::new(seed);
            let decision = engine.decide(&actors[0], &field, &mut rng);
            assert_eq!(decision.chosen.action, ActionType::Retreat, "seed {}", seed);
            assert!(matches!(decision.intent, Some(Intent::Retreat { .. })));
        }
    }

    #[test]
    fn test_healthy_actor_attacks_nearby_enemy() {
        let actors = vec![unit(1, 1, 0.0, 0.0), unit(2, 1, 1.0, 0.0), unit(3, 2, 3.0, 0.0)];
        let field = Battlefield::new(&actors, &[]);
        let engine = UtilityEngine::default();
        let mut rng = RandomStream::new(99);

        let decision = engine.decide(&actors[0], &field, &mut rng);
        assert_eq!(decision.chosen.action, ActionType::Attack);
        assert_eq!(
            decision.intent,
            Some(Intent::Attack { actor: EntityId(1), target: EntityId(3) })
        );
    }

    #[test]
    fn test_no_enemies_moves_to_objective() {
        let actors = vec![unit(1, 1, 0.0, 0.0)];
        let objectives = vec![Objective {
            id: 7,
            position: Vec2::new(10.0, 0.0),
            value: 0.8,
            feature: "expansion_site".into(),
        }];
        let field = Battlefield::new(&actors, &objectives);
        let engine = UtilityEngine::default();
        let decision = engine.decide(&actors[0], &field, &mut RandomStream::new(1));

        assert_eq!(decision.chosen.action, ActionType::Move);
        assert_eq!(
            decision.intent,
            Some(Intent::Move { actor: EntityId(1), to: Vec2::new(10.0, 0.0) })
        );
    }

    #[test]
    fn test_lone_actor_idles() {
        let actors = vec![unit(1, 1, 0.0, 0.0)];
        let field = Battlefield::new(&actors, &[]);
        let decision = UtilityEngine::default().decide(&actors[0], &field, &mut RandomStream::new(3));
        assert_eq!(decision.chosen.action, ActionType::Idle);
        assert!(decision.intent.is_none());
    }

    #[test]
    fn test_ability_scores() {
        let engine = UtilityEngine::default();
        let mut brute = Actor::new(
            EntityId(1),
            FactionId::MONSTERS,
            ActorKind::Monster(MonsterTier::Warlord),
            Vec2::default(),
        );
        brute.ability = Some(Ability::new(AbilityKind::AreaEffect, 5.0, 10.0, 5));
        let actors = vec![brute, unit(2, 1, 1.0, 0.0), unit(3, 1, 0.0, 1.0), unit(4, 1, 50.0, 0.0)];
        let field = Battlefield::new(&actors, &[]);
        let scores = engine.raw_scores(&actors[0], &field);
        assert!((scores[3].score - 0.4).abs() < 1e-9);

        let mut exhausted = actors[0].clone();
        exhausted.ability.as_mut().unwrap().trigger();
        assert_eq!(engine.raw_scores(&exhausted, &field)[3].score, 0.0);
    }

    #[test]
    fn test_perturbation_is_bounded() {
        let actors = vec![unit(1, 1, 0.0, 0.0), unit(2, 2, 5.0, 0.0)];
        let field = Battlefield::new(&actors, &[]);
        let engine = UtilityEngine::default();
        let raw = engine.raw_scores(&actors[0], &field);
        let decision = engine.decide(&actors[0], &field, &mut RandomStream::new(11));
        for (r, p) in raw.iter().zip(decision.candidates.iter()) {
            assert!((r.score - p.score).abs() <= SCORE_PERTURBATION);
        }
    }

    #[test]
    fn test_decide_all_is_reproducible() {
        let actors = vec![unit(1, 1, 0.0, 0.0), unit(2, 2, 5.0, 0.0), unit(3, 2, 6.0, 1.0)];
        let field = Battlefield::new(&actors, &[]);
        let engine = UtilityEngine::default();
        let ids = [EntityId(3), EntityId(1), EntityId(2)];

        let a = engine.decide_all(&field, &ids, &mut RandomStream::new(5));
        let b = engine.decide_all(&field, &ids, &mut RandomStream::new(5));
        assert_eq!(a, b);
        assert_eq!(a[0].actor, EntityId(1));
    }
}
