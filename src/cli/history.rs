//! CLI subcommand: `scenegpt history`

use anyhow::Result;
use clap::{Args, Subcommand};

use super::open_session;
use crate::agent::{ChatTurn, TurnRole};
use crate::config::Config;

#[derive(Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommands,
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// Show the chat history
    Show {
        /// Only the last N turns
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Include the command batch stored with each reply
        #[arg(long)]
        commands: bool,
    },

    /// Delete every turn
    Clear,
}

pub async fn run(args: HistoryArgs, config: Config) -> Result<()> {
    let (mut session, _lock) = open_session(&config)?;

    match args.command {
        HistoryCommands::Show { limit, commands } => {
            let history = session.history();
            let turns = match limit {
                Some(n) => history.recent(n),
                None => history.turns(),
            };
            print_turns(turns, commands);
        }
        HistoryCommands::Clear => {
            let count = session.clear_history();
            session.save()?;
            println!("Cleared {} turn(s).", count);
        }
    }

    Ok(())
}

pub(crate) fn print_turns(turns: &[ChatTurn], with_commands: bool) {
    if turns.is_empty() {
        println!("No chat history.");
        return;
    }

    for turn in turns {
        println!(
            "[{}] {}: {}",
            turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
            speaker(turn.role),
            turn.content
        );
        if with_commands && let Some(ref commands) = turn.commands {
            println!("{}", commands);
        }
    }
}

fn speaker(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "You",
        TurnRole::Assistant => "SceneGPT",
        TurnRole::Dreamer => "Dreamer",
    }
}
