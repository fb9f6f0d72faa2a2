//! Get command - fetch an artifact through the cache hierarchy

use crate::cli::args::GetArgs;
use crate::config::{Config, ConfigManager};
use crate::error::{GitPackError, GitPackResult};
use crate::hierarchy::CacheHierarchy;
use crate::key::ArtifactKey;
use crate::store::prune::format_bytes;
use console::style;
use std::path::PathBuf;

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config) -> GitPackResult<()> {
    let root = ConfigManager::effective_root(config);
    let hierarchy = CacheHierarchy::from_config(config, &root);

    let (url, sha) = args.spec;
    let key = ArtifactKey::for_host(&url, &sha);

    let hit = hierarchy.get(&key).await?;

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("{}.tgz", key.dir_name())));
    tokio::fs::write(&out, &hit.bytes)
        .await
        .map_err(|e| GitPackError::io(format!("writing {}", out.display()), e))?;

    println!(
        "{} {} from {} tier ({})",
        style("Fetched").green().bold(),
        key,
        hit.tier,
        format_bytes(hit.bytes.len() as u64)
    );
    println!("  {} {}", style("saved:").dim(), out.display());
    Ok(())
}
