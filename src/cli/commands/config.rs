//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{GitPackError, GitPackResult};
use console::style;
use std::path::PathBuf;

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
) -> GitPackResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> GitPackResult<()> {
    // Never echo the registry token
    let mut shown = config.clone();
    if shown.registry.token.is_some() {
        shown.registry.token = Some("<redacted>".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> GitPackResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    let config = Config::default();
    manager.save(&config).await?;

    println!(
        "{} Configuration initialized at {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> GitPackResult<()> {
    let mut config = config.clone();

    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        ["general", "verbose"] => config.general.verbose = parse_bool(value)?,
        ["general", "log_format"] => config.general.log_format = value.to_string(),

        ["cache", "root"] => config.cache.root = Some(PathBuf::from(value)),
        ["cache", "max_size_bytes"] => config.cache.max_size_bytes = parse_u64(value)?,

        ["registry", "url"] => config.registry.url = Some(value.to_string()),
        ["registry", "token"] => config.registry.token = Some(value.to_string()),
        ["registry", "enabled"] => config.registry.enabled = parse_bool(value)?,

        ["build", "tool_timeout_secs"] => config.build.tool_timeout_secs = parse_u64(value)?,
        ["build", "lock_timeout_secs"] => config.build.lock_timeout_secs = parse_u64(value)?,
        ["build", "concurrency"] => config.build.concurrency = parse_u64(value)? as usize,
        ["build", "skip_scripts"] => config.build.skip_scripts = parse_bool(value)?,

        _ => {
            eprintln!("{} Unknown config key: {}", style("✗").red(), key);
            eprintln!("Valid keys:");
            print_valid_keys();
            return Ok(());
        }
    }

    manager.save(&config).await?;
    println!("{} Set {} = {}", style("✓").green(), key, value);

    Ok(())
}

fn parse_bool(value: &str) -> GitPackResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(GitPackError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u64(value: &str) -> GitPackResult<u64> {
    value
        .parse()
        .map_err(|_| GitPackError::User(format!("Invalid number: {}", value)))
}

fn print_valid_keys() {
    let keys = [
        "general.verbose",
        "general.log_format",
        "cache.root",
        "cache.max_size_bytes",
        "registry.url",
        "registry.token",
        "registry.enabled",
        "build.tool_timeout_secs",
        "build.lock_timeout_secs",
        "build.concurrency",
        "build.skip_scripts",
    ];

    for key in keys {
        eprintln!("  {}", key);
    }
}
