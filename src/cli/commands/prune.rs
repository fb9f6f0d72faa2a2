//! Prune command - LRU eviction down to the configured ceiling

use crate::cli::args::PruneArgs;
use crate::config::{Config, ConfigManager};
use crate::error::{GitPackError, GitPackResult};
use crate::store::prune::format_bytes;
use crate::store::Pruner;
use console::style;

/// Execute the prune command
pub async fn execute(args: PruneArgs, config: &Config) -> GitPackResult<()> {
    let root = ConfigManager::effective_root(config);
    let pruner = Pruner::new(ConfigManager::tarballs_dir(&root));
    let max_size = args.max_size_bytes.unwrap_or(config.cache.max_size_bytes);
    let dry_run = args.dry_run;

    // The pruner walks the filesystem synchronously
    let report = tokio::task::spawn_blocking(move || pruner.prune(max_size, dry_run))
        .await
        .map_err(|e| GitPackError::Internal(format!("prune task aborted: {}", e)))?;

    if report.was_within_limit {
        println!(
            "{} cache within limit ({} entries, ceiling {})",
            style("OK:").green().bold(),
            report.entries_scanned,
            format_bytes(max_size)
        );
        return Ok(());
    }

    let verb = if dry_run { "would evict" } else { "evicted" };
    println!(
        "{} {} {} of {} entries, freeing {}",
        style("Pruned:").green().bold(),
        verb,
        report.entries_deleted,
        report.entries_scanned,
        format_bytes(report.space_freed)
    );
    if dry_run {
        println!("{}", style("Dry run - nothing deleted.").dim());
    }
    Ok(())
}
