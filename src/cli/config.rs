use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::{Config, Credentials, DEFAULT_CONFIG_TEMPLATE, read_key_source};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show {
        /// Output format: toml (default) or json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Get a config value
    Get {
        /// Config key (e.g., "agent.model")
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Value to set
        value: String,
    },

    /// Show config file path
    Path,

    /// Initialize a new config file
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Store the OpenAI API key in credentials.json
    SetKey {
        /// The key itself, or a path to a file containing it
        source: String,
    },
}

pub async fn run(args: ConfigArgs, config: Config) -> Result<()> {
    match args.command {
        ConfigCommands::Show { format } => show_config(&config, &format),
        ConfigCommands::Get { key } => get_config(&config, &key),
        ConfigCommands::Set { key, value } => set_config(config, &key, &value),
        ConfigCommands::Path => {
            println!("{}", config.paths.config_file().display());
            Ok(())
        }
        ConfigCommands::Init { force } => init_config(&config, force),
        ConfigCommands::SetKey { source } => set_key(&config, &source),
    }
}

fn show_config(config: &Config, format: &str) -> Result<()> {
    match format {
        "json" => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{}", json);
        }
        _ => {
            let toml = toml::to_string_pretty(config)?;
            println!("{}", toml);
        }
    }

    Ok(())
}

fn get_config(config: &Config, key: &str) -> Result<()> {
    let value = config.get_value(key)?;
    println!("{}", value);
    Ok(())
}

fn set_config(mut config: Config, key: &str, value: &str) -> Result<()> {
    config.set_value(key, value)?;
    config.save()?;
    println!("Set {} = {}", key, value);
    Ok(())
}

fn init_config(config: &Config, force: bool) -> Result<()> {
    let path = config.paths.config_file();

    // Loading already wrote the template on first run
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;

    println!("Created config file at {}", path.display());
    Ok(())
}

fn set_key(config: &Config, source: &str) -> Result<()> {
    let key = read_key_source(source)?;
    let path = config.paths.credentials_file();
    Credentials::new(&key).save(&path)?;
    println!("Saved API key ({}) to {}", mask_key(&key), path.display());
    Ok(())
}

/// "sk-abc...wxyz" style preview that never shows the whole key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
