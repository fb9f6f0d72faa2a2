//! Status command - cache usage and tier availability

use crate::config::{Config, ConfigManager};
use crate::error::GitPackResult;
use crate::hierarchy::CacheHierarchy;
use crate::store::prune::format_bytes;
use crate::store::Pruner;
use console::{style, Emoji};
use std::process::Stdio;
use tokio::process::Command;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(config: &Config) -> GitPackResult<()> {
    println!("{}", style("gitpack Status").bold().cyan());
    println!();

    let root = ConfigManager::effective_root(config);

    // Local cache usage
    println!("{}", style("Local cache:").bold());
    println!("  {} Root: {}", CHECK, root.display());

    let pruner = Pruner::new(ConfigManager::tarballs_dir(&root));
    let entries = pruner.entry_count();
    let used = pruner.total_size();
    let ceiling = config.cache.max_size_bytes;
    let usage_icon = if used > ceiling { WARN } else { CHECK };
    println!(
        "  {} Usage: {} entries, {} of {}",
        usage_icon,
        entries,
        format_bytes(used),
        format_bytes(ceiling)
    );
    if used > ceiling {
        println!(
            "  {} {} - Run: gitpack prune",
            WARN,
            style("Over ceiling").yellow()
        );
    }

    // Tier availability
    println!();
    println!("{}", style("Cache tiers:").bold());
    let hierarchy = CacheHierarchy::from_config(config, &root);
    for row in hierarchy.status().await {
        let icon = if row.available { CHECK } else { CROSS };
        let auth = match row.authenticated {
            Some(true) => " (authenticated)",
            Some(false) => " (anonymous)",
            None => "",
        };
        let state = if row.available {
            style("available").green()
        } else {
            style("unavailable").red()
        };
        println!("  {} {} - {}{}", icon, row.tier, state, auth);
    }
    if !config.registry.is_configured() {
        println!(
            "  {} registry - {} (set registry.url and registry.enabled)",
            WARN,
            style("not configured").dim()
        );
    }

    // External tools the build pipeline shells out to
    println!();
    println!("{}", style("Build tools:").bold());
    check_tool("git", &["--version"]).await;
    check_tool("npm", &["--version"]).await;

    Ok(())
}

async fn check_tool(name: &str, args: &[&str]) {
    let result = Command::new(name)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            let first_line = version.lines().next().unwrap_or("unknown");
            println!("  {} {} - {}", CHECK, style(name).green(), first_line.trim());
        }
        _ => {
            println!(
                "  {} {} - Not found on PATH",
                CROSS,
                style(name).red()
            );
        }
    }
}
