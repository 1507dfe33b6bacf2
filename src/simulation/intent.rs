//! Intents: action proposals produced for AI-controlled actors
//!
//! These mirror the tagged records of the command channel. Decision
//! components only ever return intents; [`SimulationState`] applies them.
//!
//! [`SimulationState`]: crate::simulation::SimulationState

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, Vec2};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Move { actor: EntityId, to: Vec2 },
    Attack { actor: EntityId, target: EntityId },
    /// Harvest the objective with the given id
    Gather { actor: EntityId, site: u32 },
    Build { actor: EntityId, structure: String, at: Vec2 },
    Retreat { actor: EntityId, to: Vec2 },
    UseAbility { actor: EntityId, at: Vec2 },
}

impl Intent {
    /// Actor the intent is issued for
    pub fn actor(&self) -> EntityId {
        match self {
            Intent::Move { actor, .. }
            | Intent::Attack { actor, .. }
            | Intent::Gather { actor, .. }
            | Intent::Build { actor, .. }
            | Intent::Retreat { actor, .. }
            | Intent::UseAbility { actor, .. } => *actor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_serialization_is_tagged() {
        let intent = Intent::Attack {
            actor: EntityId(3),
            target: EntityId(9),
        };
        let json = serde_json::to_string(&intent).unwrap();
        assert_eq!(json, r#"{"type":"attack","actor":3,"target":9}"#);
    }

    #[test]
    fn test_actor_accessor() {
        let intent = Intent::Retreat {
            actor: EntityId(4),
            to: Vec2::new(1.0, 1.0),
        };
        assert_eq!(intent.actor(), EntityId(4));
    }
}
