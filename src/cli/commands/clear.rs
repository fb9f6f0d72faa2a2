//! Clear command - remove every artifact from the local cache

use crate::cli::args::ClearArgs;
use crate::config::{Config, ConfigManager};
use crate::error::GitPackResult;
use crate::hierarchy::CacheHierarchy;
use crate::store::prune::format_bytes;
use crate::store::Pruner;
use console::style;
use std::io::{self, Write};

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config) -> GitPackResult<()> {
    let root = ConfigManager::effective_root(config);
    let pruner = Pruner::new(ConfigManager::tarballs_dir(&root));
    let entries = pruner.entry_count();
    let bytes = pruner.total_size();

    if entries == 0 {
        println!("Local cache is already empty.");
        return Ok(());
    }

    println!(
        "This will remove {} cached artifact(s) ({}). Shared tiers are untouched.",
        entries,
        format_bytes(bytes)
    );

    if !args.yes {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let hierarchy = CacheHierarchy::from_config(config, &root);
    let removed = hierarchy.clear().await?;

    println!(
        "{} cleared {} artifact(s), freed {}",
        style("✓").green(),
        removed,
        format_bytes(bytes)
    );
    Ok(())
}
