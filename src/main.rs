use anyhow::Result;
use clap::Parser;

use scenegpt::Config;
use scenegpt::cli::{self, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    // Initialize logging; RUST_LOG wins over --verbose and the config file
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        );
    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Generate(args) => cli::generate::run(args, config).await,
        Commands::Execute => cli::execute::run(config).await,
        Commands::Chat(args) => cli::chat::run(args, config).await,
        Commands::History(args) => cli::history::run(args, config).await,
        Commands::Scene(args) => cli::scene::run(args, config).await,
        Commands::Copy(args) => cli::copy::run(args, config).await,
        Commands::Config(args) => cli::config::run(args, config).await,
        Commands::Paths => cli::paths::run(&config.paths),
    }
}
