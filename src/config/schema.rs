//! Configuration schema for gitpack
//!
//! Configuration is stored as JSON at `~/.gitpack/config.json`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Local cache settings
    pub cache: CacheConfig,

    /// Shared registry tier settings
    pub registry: RegistryConfig,

    /// Build pipeline settings
    pub build: BuildConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose tier-decision tracing
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Local cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Override the cache root (default: ~/.gitpack)
    pub root: Option<PathBuf>,

    /// Ceiling for the tarball cache in bytes before eviction kicks in
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            // 5 GiB
            max_size_bytes: 5 * 1024 * 1024 * 1024,
        }
    }
}

/// Shared registry tier settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the shared artifact registry
    pub url: Option<String>,

    /// Bearer token; overridden by GITPACK_TOKEN at load time
    pub token: Option<String>,

    /// Whether the registry tier participates in lookups
    pub enabled: bool,
}

impl RegistryConfig {
    /// Whether the registry tier can be probed at all
    pub fn is_configured(&self) -> bool {
        self.enabled && self.url.is_some()
    }

    /// Whether requests would carry credentials
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Build pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Timeout for each external tool invocation, in seconds
    pub tool_timeout_secs: u64,

    /// Timeout waiting on another process's build lock, in seconds
    pub lock_timeout_secs: u64,

    /// Maximum concurrent builds for independent keys
    pub concurrency: usize,

    /// Skip lifecycle scripts by default
    pub skip_scripts: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 600,
            lock_timeout_secs: 600,
            concurrency: 4,
            skip_scripts: false,
        }
    }
}
