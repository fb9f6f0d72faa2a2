//! Build command - build artifacts from source into the local cache

use crate::build::{BuildOptions, BuildResult, SourceBuildPipeline};
use crate::cli::args::BuildArgs;
use crate::config::{Config, ConfigManager};
use crate::error::{GitPackError, GitPackResult};
use crate::hierarchy::CacheHierarchy;
use crate::key::{host_platform, ArtifactKey};
use crate::store::LocalArtifactStore;
use console::style;
use std::sync::Arc;
use tracing::warn;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> GitPackResult<()> {
    let root = ConfigManager::effective_root(config);
    let store = LocalArtifactStore::new(ConfigManager::tarballs_dir(&root));
    let pipeline = Arc::new(SourceBuildPipeline::new(
        store,
        ConfigManager::locks_dir(&root),
        &config.build,
    ));

    let platform = args.platform.unwrap_or_else(host_platform);
    let keys: Vec<ArtifactKey> = args
        .specs
        .iter()
        .map(|(url, sha)| ArtifactKey::new(url, sha, &platform))
        .collect();

    let opts = BuildOptions {
        force: args.force,
        skip_scripts: args.skip_scripts || config.build.skip_scripts,
    };

    let total = keys.len();
    let results = pipeline.build_many(keys, opts).await;

    // Fresh builds fan out through the tier hierarchy so the shared registry
    // receives them; nothing to share when no registry is configured.
    let hierarchy = config
        .registry
        .is_configured()
        .then(|| CacheHierarchy::from_config(config, &root));

    let mut failures = 0usize;
    for (key, result) in &results {
        match result {
            Ok(built) => {
                print_built(built);
                if !built.from_cache {
                    if let Some(ref hierarchy) = hierarchy {
                        share(hierarchy, key, built).await;
                    }
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", style("Failed").red().bold(), key, e);
            }
        }
    }

    println!();
    if failures == 0 {
        println!(
            "{} {} artifact(s) ready",
            style("Done:").green().bold(),
            total
        );
        Ok(())
    } else {
        Err(GitPackError::User(format!(
            "{} of {} builds failed",
            failures, total
        )))
    }
}

fn print_built(built: &BuildResult) {
    let label = if built.from_cache {
        style("Cached").cyan().bold()
    } else {
        style("Built").green().bold()
    };
    let pkg = built
        .package_info
        .as_ref()
        .map(|p| format!(" ({}@{})", p.name, p.version))
        .unwrap_or_default();
    println!("{} {}{}", label, built.key, pkg);
    println!("  {} {}", style("integrity:").dim(), built.integrity);
    println!("  {} {}", style("path:").dim(), built.artifact_path.display());
}

/// Push a freshly built artifact through the hierarchy's store fan-out. The
/// pipeline already persisted it locally, so the local write is an idempotent
/// no-op and remote failures only warn.
async fn share(hierarchy: &CacheHierarchy, key: &ArtifactKey, built: &BuildResult) {
    let bytes = match tokio::fs::read(&built.artifact_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                "could not read {} for sharing: {}",
                built.artifact_path.display(),
                e
            );
            return;
        }
    };
    match hierarchy.store(key, &bytes).await {
        Ok(outcomes) => {
            for outcome in outcomes {
                if outcome.tier == "local" {
                    continue;
                }
                match outcome.error {
                    None => println!(
                        "  {} pushed to {} tier",
                        style("shared:").dim(),
                        outcome.tier
                    ),
                    Some(e) => eprintln!(
                        "  {} {} tier: {}",
                        style("share failed:").yellow(),
                        outcome.tier,
                        e
                    ),
                }
            }
        }
        Err(e) => warn!("sharing {} failed: {}", key, e),
    }
}
