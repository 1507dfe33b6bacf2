//! Compact strategic snapshot
//!
//! The only view of the game that may cross the advisory boundary: resource
//! totals, unit-type counts and coarse map-feature tags. Built fresh per
//! decision from the simulation state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::types::{FactionId, Tick};
use crate::simulation::state::{ResourceTotals, SimulationState};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategicSnapshot {
    pub tick: Tick,
    pub faction: FactionId,
    pub resources: ResourceTotals,
    /// Living own units by type label
    pub own_units: BTreeMap<String, u32>,
    /// Living hostile units by type label, spawned creatures included
    pub enemy_units: BTreeMap<String, u32>,
    /// Sorted, de-duplicated objective feature tags
    pub map_features: Vec<String>,
}

impl StrategicSnapshot {
    pub fn from_state(state: &SimulationState, faction: FactionId) -> Self {
        let mut own_units = BTreeMap::new();
        let mut enemy_units = BTreeMap::new();
        for actor in state.actors().iter().filter(|a| a.is_alive()) {
            let counts = if actor.faction == faction {
                &mut own_units
            } else {
                &mut enemy_units
            };
            *counts.entry(actor.kind.label().to_string()).or_insert(0) += 1;
        }

        let map_features = state
            .objectives
            .iter()
            .map(|o| o.feature.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            tick: state.tick,
            faction,
            resources: state.resources(faction),
            own_units,
            enemy_units,
            map_features,
        }
    }

    pub fn own_total(&self) -> u32 {
        self.own_units.values().sum()
    }

    pub fn enemy_total(&self) -> u32 {
        self.enemy_units.values().sum()
    }

    pub fn has_feature(&self, tag: &str) -> bool {
        self.map_features.iter().any(|f| f == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec2;
    use crate::simulation::actor::{ActorKind, UnitClass};
    use crate::simulation::state::Objective;
    use crate::spawner::MonsterTier;

    #[test]
    fn test_counts_by_side_and_type() {
        let mut state = SimulationState::new();
        state.add_faction(FactionId(1), ResourceTotals { gold: 40, supply_used: 0, supply_cap: 10 });
        state.spawn_actor(FactionId(1), ActorKind::Unit(UnitClass::Infantry), Vec2::default());
        state.spawn_actor(FactionId(1), ActorKind::Unit(UnitClass::Infantry), Vec2::default());
        state.spawn_actor(FactionId(1), ActorKind::Unit(UnitClass::Archer), Vec2::default());
        state.spawn_actor(FactionId(2), ActorKind::Unit(UnitClass::Mystic), Vec2::default());
        state.spawn_actor(FactionId::MONSTERS, ActorKind::Monster(MonsterTier::Brute), Vec2::default());
        for (id, feature) in [(1, "ridge"), (2, "resource_site"), (3, "ridge")] {
            state.objectives.push(Objective {
                id,
                position: Vec2::default(),
                value: 0.5,
                feature: feature.into(),
            });
        }

        let snapshot = StrategicSnapshot::from_state(&state, FactionId(1));
        assert_eq!(snapshot.own_units.get("infantry"), Some(&2));
        assert_eq!(snapshot.own_units.get("archer"), Some(&1));
        assert_eq!(snapshot.enemy_total(), 2);
        assert_eq!(snapshot.enemy_units.get("brute"), Some(&1));
        assert_eq!(snapshot.map_features, vec!["resource_site".to_string(), "ridge".to_string()]);
        assert_eq!(snapshot.resources.gold, 40);
        assert_eq!(snapshot.resources.supply_used, 3);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(StrategicSnapshot::default()).unwrap();
        assert!(json.get("ownUnits").is_some());
        assert!(json.get("mapFeatures").is_some());
        assert!(json["resources"].get("supplyCap").is_some());
    }
}
