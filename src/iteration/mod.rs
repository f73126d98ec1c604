mod events;
mod runner;

pub use events::{IterationEvent, IterationStatus, Progress, now_ms};
pub use runner::{IterationDriver, IterationOutcome, IterationStep, MAX_ITERATIONS};
