pub mod chat;
pub mod config;
pub mod copy;
pub mod execute;
pub mod generate;
pub mod history;
pub mod paths;
pub mod scene;
pub mod slash;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::concurrency::{SessionLock, SessionLockGuard};
use crate::config::Config;
use crate::session::Session;

#[derive(Parser)]
#[command(name = "scenegpt")]
#[command(author, version, about = "Turn natural-language prompts into 3D scene edits")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a command batch from a prompt and apply it
    Generate(generate::GenerateArgs),

    /// Re-run the last generated batch
    Execute,

    /// Chat with the assistant (interactive when no message is given)
    Chat(chat::ChatArgs),

    /// Show or clear the chat history
    History(history::HistoryArgs),

    /// Inspect, clear or undo the scene
    Scene(scene::SceneArgs),

    /// Print the last generated commands or execution result
    Copy(copy::CopyArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Show resolved XDG directory paths
    Paths,
}

/// Open the persisted session, holding the session lock for as long as
/// the returned guard lives.
pub(crate) fn open_session(config: &Config) -> Result<(Session, SessionLockGuard)> {
    let lock = SessionLock::new(&config.paths)?;
    let guard = match lock.try_acquire()? {
        Some(guard) => guard,
        None => {
            eprintln!("Another scenegpt process is using the session, waiting...");
            lock.acquire()?
        }
    };
    let session = Session::open(config.clone())?;
    Ok((session, guard))
}
