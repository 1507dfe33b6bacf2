//! Simulation: actor model, intents, deterministic state mutation and the
//! headless match runner

pub mod actor;
pub mod intent;
pub mod runner;
pub mod state;

pub use actor::{Ability, AbilityKind, Actor, ActorKind, UnitClass};
pub use intent::Intent;
pub use runner::{ActionLogEntry, MapConfig, Match, MatchOutcome};
pub use state::{Objective, ResourceTotals, SimulationState};
