//! Tactical AI: per-actor utility scoring and squad coordination
//!
//! Both read the battlefield through an immutable [`Battlefield`] view and
//! return intents; neither mutates simulation state.

pub mod context;
pub mod squad;
pub mod utility;

pub use context::Battlefield;
pub use squad::{combined_strength, SquadCoordinator, SquadState};
pub use utility::{ActionCandidate, ActionType, UtilityDecision, UtilityEngine, SCORE_PERTURBATION};
