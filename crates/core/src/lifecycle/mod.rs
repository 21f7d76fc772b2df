pub mod engine;
pub mod transitions;
mod views;

pub use engine::LifecycleEngine;
pub use transitions::{next_status, LifecycleEvent, TransitionOutcome};
