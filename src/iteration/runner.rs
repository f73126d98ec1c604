//! Timer-driven "suggest and add" rounds.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::events::{IterationEvent, IterationStatus, Progress, preview};
use crate::agent::build_iteration_prompt;
use crate::scene::SceneSnapshot;

pub const MAX_ITERATIONS: u32 = 10;

/// One generate-and-execute round against the live scene.
#[async_trait]
pub trait IterationStep: Send {
    /// Fresh snapshot used to build the round's prompt.
    fn snapshot(&self) -> SceneSnapshot;

    /// Run the round and return its status text.
    async fn run_round(&mut self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    Completed { rounds: u32 },
    Cancelled { completed: u32 },
    Failed { completed: u32, error: String },
}

pub struct IterationDriver {
    iterations: u32,
    tick: Duration,
    cancel: Arc<AtomicBool>,
}

impl IterationDriver {
    /// `iterations` is clamped to `0..=10`.
    pub fn new(iterations: u32, tick: Duration) -> Self {
        Self {
            iterations: iterations.min(MAX_ITERATIONS),
            tick,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancel flag owned by the caller, e.g. a Ctrl-C handler.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Set to stop the loop at the next tick boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub async fn run<S, F>(&self, step: &mut S, mut on_event: F) -> IterationOutcome
    where
        S: IterationStep + ?Sized,
        F: FnMut(&IterationEvent),
    {
        let total = self.iterations;
        if total == 0 {
            return IterationOutcome::Completed { rounds: 0 };
        }

        info!("Starting {} iteration(s), tick {:?}", total, self.tick);

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; rounds start one tick later
        ticker.tick().await;

        for round in 1..=total {
            ticker.tick().await;

            let completed = round - 1;
            if self.cancel.load(Ordering::SeqCst) {
                info!("Iteration cancelled after {} round(s)", completed);
                on_event(&IterationEvent::new(
                    IterationStatus::Cancelled,
                    Progress {
                        current: completed,
                        total,
                    },
                ));
                return IterationOutcome::Cancelled { completed };
            }

            let prompt = build_iteration_prompt(&step.snapshot());
            debug!("Iteration {}/{} prompt: {}", round, total, prompt);

            let progress = Progress {
                current: round,
                total,
            };
            on_event(&IterationEvent::new(IterationStatus::Started, progress));

            let start = Instant::now();
            match step.run_round(&prompt).await {
                Ok(status) => {
                    let mut event = IterationEvent::new(IterationStatus::Finished, progress);
                    event.duration_ms = start.elapsed().as_millis() as u64;
                    event.preview = Some(preview(&status));
                    on_event(&event);
                }
                Err(e) => {
                    warn!("Iteration {}/{} failed: {}", round, total, e);
                    let mut event = IterationEvent::new(IterationStatus::Failed, progress);
                    event.duration_ms = start.elapsed().as_millis() as u64;
                    event.reason = Some(e.to_string());
                    on_event(&event);
                    return IterationOutcome::Failed {
                        completed,
                        error: e.to_string(),
                    };
                }
            }
        }

        on_event(&IterationEvent::new(
            IterationStatus::Completed,
            Progress {
                current: total,
                total,
            },
        ));
        info!("Completed {} iteration(s)", total);
        IterationOutcome::Completed { rounds: total }
    }
}
