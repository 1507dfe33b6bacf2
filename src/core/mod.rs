pub mod bounded;
pub mod config;
pub mod error;
pub mod rng;
pub mod types;

pub use bounded::{BoundedCall, Resolved};
pub use config::SimConfig;
pub use error::{Result, SimError};
pub use rng::RandomStream;
