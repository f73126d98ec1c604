use anyhow::Result;
use clap::Args;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};

use super::copy::{CopyTarget, copy_text};
use super::history::print_turns;
use super::open_session;
use super::scene::print_snapshot;
use super::slash;
use crate::config::Config;
use crate::scene::{Scene, SnapshotDetail};
use crate::session::Session;

#[derive(Args)]
pub struct ChatArgs {
    /// Send one message and exit instead of starting the interactive chat
    pub message: Option<String>,

    /// Answer with the offline Dreamer instead of the model
    #[arg(long)]
    pub dreamer: bool,

    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,
}

pub async fn run(args: ChatArgs, config: Config) -> Result<()> {
    let (mut session, _lock) = open_session(&config)?;
    if let Some(ref model) = args.model {
        session.set_model(model);
    }

    if let Some(message) = args.message {
        let reply = session.send_chat_message(&message, args.dreamer).await;
        session.save()?;
        println!("{}", reply?);
        return Ok(());
    }

    let mut dreamer = args.dreamer;
    let key_status = if session.has_api_key() {
        "configured"
    } else {
        "missing (use /key or /dreamer)"
    };
    println!(
        "SceneGPT v{} | Model: {} | API key: {} | Objects: {}\n",
        env!("CARGO_PKG_VERSION"),
        session.model(),
        key_status,
        session.scene().len()
    );
    println!("Type /help for commands, /quit to exit\n");

    let mut rl = DefaultEditor::new()?;
    let mut stdout = io::stdout();

    loop {
        let readline = rl.readline("You: ");

        let input = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break; // Ctrl+D
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let _ = rl.add_history_entry(input);

        if input.starts_with('/') {
            match handle_command(input, &mut session, &mut dreamer) {
                CommandResult::Continue => {}
                CommandResult::Quit => break,
                CommandResult::Error(e) => eprintln!("Error: {}\n", e),
            }
            if let Err(e) = session.save() {
                eprintln!("Warning: Failed to save session: {}", e);
            }
            continue;
        }

        let speaker = if dreamer { "Dreamer" } else { "SceneGPT" };
        print!("\n{}: ", speaker);
        stdout.flush().ok();

        match session.send_chat_message(input, dreamer).await {
            Ok(reply) => {
                println!("{}\n", reply);
                if let Err(e) = session.save() {
                    eprintln!("Warning: Failed to save session: {}", e);
                }
            }
            Err(e) => eprintln!("\nError: {}\n", e),
        }
    }

    println!("Goodbye!");
    Ok(())
}

#[derive(Debug, PartialEq)]
enum CommandResult {
    Continue,
    Quit,
    Error(String),
}

fn handle_command(input: &str, session: &mut Session, dreamer: &mut bool) -> CommandResult {
    let mut parts = input.split_whitespace();
    let word = parts.next().unwrap_or_default();
    let arg = parts.next();

    let Some(cmd) = slash::find(word) else {
        return CommandResult::Error(format!(
            "Unknown command: {}. Type /help for commands.",
            word
        ));
    };

    match cmd.name {
        "quit" => CommandResult::Quit,

        "help" => {
            println!("\n{}\n", slash::format_help_text());
            CommandResult::Continue
        }

        "dreamer" => {
            *dreamer = match arg {
                Some("on") => true,
                Some("off") => false,
                Some(other) => {
                    return CommandResult::Error(format!(
                        "Usage: /dreamer [on|off], got '{}'",
                        other
                    ));
                }
                None => !*dreamer,
            };
            let state = if *dreamer { "on" } else { "off" };
            println!("\nDreamer mode {}.\n", state);
            CommandResult::Continue
        }

        "scene" => {
            println!();
            print_snapshot(&session.snapshot(session.detail()));
            println!();
            CommandResult::Continue
        }

        "undo" => {
            match session.undo() {
                Some(label) => println!("\nUndid \"{}\".\n", label),
                None => println!("\nNothing to undo.\n"),
            }
            CommandResult::Continue
        }

        "execute" => {
            if !session.has_pending_batch() {
                return CommandResult::Error("No generated commands to execute.".into());
            }
            let batch = session.execute();
            println!("\n{}\n", batch.report());
            CommandResult::Continue
        }

        "copy" => {
            let target = match arg {
                None | Some("commands") => CopyTarget::Commands,
                Some("explanation") => CopyTarget::Explanation,
                Some("result") => CopyTarget::Result,
                Some(other) => {
                    return CommandResult::Error(format!(
                        "Usage: /copy [commands|explanation|result], got '{}'",
                        other
                    ));
                }
            };
            println!("\n{}\n", copy_text(session, target));
            CommandResult::Continue
        }

        "history" => {
            let n = match arg.map(str::parse::<usize>) {
                None => 10,
                Some(Ok(n)) => n,
                Some(Err(_)) => return CommandResult::Error("Usage: /history [n]".into()),
            };
            println!();
            print_turns(session.history().recent(n), false);
            println!();
            CommandResult::Continue
        }

        "clear" => {
            let count = session.clear_history();
            println!("\nCleared {} turn(s).\n", count);
            CommandResult::Continue
        }

        "clear-scene" => {
            let count = session.clear_scene();
            println!("\nDeleted {} object(s). Use /undo to bring them back.\n", count);
            CommandResult::Continue
        }

        "model" => {
            match arg {
                Some(model) => {
                    session.set_model(model);
                    println!("\nSwitched to model: {}\n", model);
                }
                None => println!("\nCurrent model: {}\n", session.model()),
            }
            CommandResult::Continue
        }

        "detail" => match arg.map(str::parse::<SnapshotDetail>) {
            Some(Ok(detail)) => {
                session.set_detail(detail);
                println!("\nSnapshot detail: {}\n", detail.as_str());
                CommandResult::Continue
            }
            Some(Err(e)) => CommandResult::Error(e.to_string()),
            None => {
                println!("\nSnapshot detail: {}\n", session.detail().as_str());
                CommandResult::Continue
            }
        },

        "key" => {
            let Some(source) = arg else {
                return CommandResult::Error("Usage: /key <key|path>".into());
            };
            match session.configure_key(source) {
                Ok(()) => {
                    println!("\nAPI key saved.\n");
                    CommandResult::Continue
                }
                Err(e) => CommandResult::Error(format!("Failed to set key: {}", e)),
            }
        }

        other => CommandResult::Error(format!("/{} is not available here", other)),
    }
}
