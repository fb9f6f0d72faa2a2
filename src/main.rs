//! gitpack - content-addressed build cache for git dependencies
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use gitpack::cli::{Cli, Commands};
use gitpack::config::ConfigManager;
use gitpack::error::GitPackResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GitPackResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug. The persisted
    // general.verbose raises the floor to info.
    let filter = match cli.verbose {
        0 if !config.general.verbose => EnvFilter::new("gitpack=warn"),
        0 | 1 => EnvFilter::new("gitpack=info"),
        _ => EnvFilter::new("gitpack=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time();
    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    // Ensure the cache layout exists before any command touches it
    let root = ConfigManager::effective_root(&config);
    ConfigManager::ensure_cache_dirs(&root).await?;

    // Dispatch to command
    match cli.command {
        Commands::Build(args) => gitpack::cli::commands::build(args, &config).await,
        Commands::Get(args) => gitpack::cli::commands::get(args, &config).await,
        Commands::Prune(args) => gitpack::cli::commands::prune(args, &config).await,
        Commands::Clear(args) => gitpack::cli::commands::clear(args, &config).await,
        Commands::Status => gitpack::cli::commands::status(&config).await,
        Commands::Config(args) => {
            gitpack::cli::commands::config(args, &config_manager, &config).await
        }
    }
}
