//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// gitpack - content-addressed build cache for git dependencies
///
/// Builds npm packages straight from a git URL and commit SHA, caches the
/// resulting tarball locally, and falls back to a shared registry or the
/// upstream repository when the local cache misses.
#[derive(Parser, Debug)]
#[command(name = "gitpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "GITPACK_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build artifacts from source and store them in the local cache
    Build(BuildArgs),

    /// Fetch an artifact through the cache hierarchy
    Get(GetArgs),

    /// Evict least-recently-used artifacts until the cache fits its ceiling
    Prune(PruneArgs),

    /// Remove every artifact from the local cache
    Clear(ClearArgs),

    /// Show cache usage and tier availability
    Status,

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Dependency specs to build, as <git-url>#<commit-sha>
    #[arg(required = true, value_parser = parse_spec)]
    pub specs: Vec<(String, String)>,

    /// Rebuild even when a cached artifact exists
    #[arg(short, long)]
    pub force: bool,

    /// Do not run lifecycle scripts (prepare etc.)
    #[arg(long)]
    pub skip_scripts: bool,

    /// Platform tag to key artifacts under (defaults to the host)
    #[arg(long)]
    pub platform: Option<String>,
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Dependency spec, as <git-url>#<commit-sha>
    #[arg(value_parser = parse_spec)]
    pub spec: (String, String),

    /// Output path for the tarball (defaults to <sha>-<platform>.tgz)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Arguments for the prune command
#[derive(Parser, Debug)]
pub struct PruneArgs {
    /// Override the cache ceiling in bytes for this pass
    #[arg(long)]
    pub max_size_bytes: Option<u64>,

    /// Show what would be evicted without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., registry.url)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Parse a dependency spec in `<git-url>#<commit-sha>` format.
///
/// Splits on the last '#' so URLs containing '#' earlier (rare, but legal)
/// keep everything before the final separator.
pub fn parse_spec(s: &str) -> Result<(String, String), String> {
    let (url, sha) = s
        .rsplit_once('#')
        .ok_or_else(|| format!("invalid spec '{s}': expected <git-url>#<commit-sha>"))?;
    if url.is_empty() {
        return Err(format!("invalid spec '{s}': empty git URL"));
    }
    if sha.is_empty() {
        return Err(format!("invalid spec '{s}': empty commit SHA"));
    }
    Ok((url.to_string(), sha.to_string()))
}
