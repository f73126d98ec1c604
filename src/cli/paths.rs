//! CLI subcommand: `scenegpt paths`
//!
//! Prints all resolved XDG-compliant paths for debugging and scripting.

use anyhow::Result;

use crate::paths::Paths;

pub fn run(paths: &Paths) -> Result<()> {
    println!("SceneGPT Paths (XDG Base Directory)");
    println!("===================================");
    println!();
    println!("Config:     {}", paths.config_dir.display());
    println!("  config.toml:      {}", paths.config_file().display());
    println!("  credentials:      {}", paths.credentials_file().display());
    println!();
    println!("State:      {}", paths.state_dir.display());
    println!("  session:          {}", paths.session_file().display());
    println!();
    match paths.runtime_dir {
        Some(ref dir) => println!("Runtime:    {}", dir.display()),
        None => println!("Runtime:    (not available)"),
    }
    println!("  session lock:     {}", paths.session_lock().display());

    Ok(())
}
