//! CLI subcommand: `scenegpt scene`

use anyhow::Result;
use clap::{Args, Subcommand};

use super::open_session;
use crate::config::Config;
use crate::scene::{SceneSnapshot, SnapshotDetail};

#[derive(Args)]
pub struct SceneArgs {
    #[command(subcommand)]
    pub command: SceneCommands,
}

#[derive(Subcommand)]
pub enum SceneCommands {
    /// List objects in the scene
    Show {
        /// Names, types and locations only
        #[arg(long)]
        low_detail: bool,

        /// Print the snapshot exactly as the model sees it
        #[arg(long)]
        json: bool,
    },

    /// Delete every object (undoable)
    Clear,

    /// Revert the most recent batch
    Undo,
}

pub async fn run(args: SceneArgs, config: Config) -> Result<()> {
    let (mut session, _lock) = open_session(&config)?;

    match args.command {
        SceneCommands::Show { low_detail, json } => {
            let detail = if low_detail {
                SnapshotDetail::Low
            } else {
                SnapshotDetail::Full
            };
            let snapshot = session.snapshot(detail);
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
        }
        SceneCommands::Clear => {
            let count = session.clear_scene();
            session.save()?;
            println!("Deleted {} object(s).", count);
        }
        SceneCommands::Undo => {
            match session.undo() {
                Some(label) => println!("Undid \"{}\".", label),
                None => println!("Nothing to undo."),
            }
            session.save()?;
        }
    }

    Ok(())
}

pub(crate) fn print_snapshot(snapshot: &SceneSnapshot) {
    println!("{}", snapshot.describe());
    for object in &snapshot.objects {
        let [x, y, z] = object.location;
        let mut line = format!(
            "  {:<20} {:<10} ({:.2}, {:.2}, {:.2})",
            object.name,
            object.kind.as_str(),
            x,
            y,
            z
        );
        if let Some(ref material) = object.material {
            line.push_str(&format!("  material={}", material));
        }
        if object.visible == Some(false) {
            line.push_str("  hidden");
        }
        println!("{}", line);
    }
    for camera in &snapshot.cameras {
        println!("  camera {} (lens {}mm)", camera.name, camera.lens);
    }
    for light in &snapshot.lights {
        println!("  light {} ({}, {}W)", light.name, light.light_type, light.energy);
    }
}
