mod engine;
mod phase;

pub use engine::{EngineState, SessionEngine};
pub use phase::{next_phase, Phase};
