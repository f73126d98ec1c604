//! CLI subcommand: `scenegpt generate`

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

use super::open_session;
use crate::config::Config;
use crate::iteration::{IterationDriver, IterationOutcome, MAX_ITERATIONS};
use crate::scene::SnapshotDetail;

#[derive(Args)]
pub struct GenerateArgs {
    /// What to build, e.g. "a red cube next to a blue sphere"
    pub prompt: String,

    /// Follow-up "suggest and add" rounds after the first batch (max 10)
    #[arg(short, long, default_value_t = 0, value_parser = iteration_count)]
    pub iterations: u32,

    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the generated commands without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Send a names/types/locations-only snapshot
    #[arg(long)]
    pub low_detail: bool,
}

fn iteration_count(s: &str) -> Result<u32, String> {
    let n: u32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if n > MAX_ITERATIONS {
        return Err(format!("at most {} iterations are allowed", MAX_ITERATIONS));
    }
    Ok(n)
}

pub async fn run(args: GenerateArgs, config: Config) -> Result<()> {
    let tick = Duration::from_millis(config.iteration.tick_ms);
    let (mut session, _lock) = open_session(&config)?;

    if let Some(ref model) = args.model {
        session.set_model(model);
    }
    if args.low_detail {
        session.set_detail(SnapshotDetail::Low);
    }

    let reply = session.generate(&args.prompt).await?;
    if !reply.explanation.is_empty() {
        println!("{}", reply.explanation);
    }
    if let Some(ref follow_up) = reply.follow_up {
        println!("{}", follow_up);
    }

    if args.dry_run {
        match session.last_commands_text() {
            Some(commands) => println!("{}", commands),
            None => println!("No commands generated."),
        }
        session.save()?;
        return Ok(());
    }

    let batch = session.execute();
    println!("{}", batch.report());
    session.save()?;

    if args.iterations == 0 {
        return Ok(());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, cancelling iteration");
            on_interrupt.store(true, Ordering::SeqCst);
        }
    });
    let driver = IterationDriver::new(args.iterations, tick).with_cancel_flag(cancel);

    println!(
        "Iterating {} time(s), one round every {:?}. Press Ctrl-C to stop.",
        driver.iterations(),
        tick
    );
    let outcome = driver
        .run(&mut session, |event| println!("{}", event.status_line()))
        .await;
    session.save()?;

    match outcome {
        IterationOutcome::Completed { .. } => Ok(()),
        IterationOutcome::Cancelled { completed } => {
            println!("Stopped after {} round(s).", completed);
            Ok(())
        }
        IterationOutcome::Failed { completed, error } => {
            anyhow::bail!("Iteration stopped after {} round(s): {}", completed, error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_count_is_bounded() {
        assert_eq!(iteration_count("0"), Ok(0));
        assert_eq!(iteration_count("10"), Ok(10));
        assert!(iteration_count("11").is_err());
        assert!(iteration_count("-1").is_err());
    }
}
