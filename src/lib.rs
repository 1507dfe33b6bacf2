//! Skirmish - deterministic skirmish simulation core
//!
//! Seeded simulation (random source, entity spawner, utility AI and squad
//! coordination), a hybrid strategic arbiter that can consult a remote
//! advisor without stalling the tick loop, and a replay pipeline that
//! turns runs into cacheable, verifiable artifacts.

pub mod ai;
pub mod arbiter;
pub mod core;
pub mod replay;
pub mod simulation;
pub mod spawner;
