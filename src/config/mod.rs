//! Configuration management for gitpack

pub mod schema;

pub use schema::Config;

use crate::error::{GitPackError, GitPackResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default cache root: `~/.gitpack`
    pub fn cache_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gitpack")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::cache_root().join("config.json")
    }

    /// Get the tarball store directory under a cache root
    pub fn tarballs_dir(root: &Path) -> PathBuf {
        root.join("tarballs")
    }

    /// Get the build-lock directory under a cache root
    pub fn locks_dir(root: &Path) -> PathBuf {
        root.join("locks")
    }

    /// Load configuration, creating default if not exists.
    ///
    /// `GITPACK_TOKEN` in the environment overrides the persisted registry
    /// token. This is the only place ambient state is read; everything
    /// downstream receives the constructed `Config`.
    pub async fn load(&self) -> GitPackResult<Config> {
        let mut config = if self.config_path.exists() {
            self.load_from_file(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            Config::default()
        };

        if let Ok(token) = std::env::var("GITPACK_TOKEN") {
            if !token.is_empty() {
                debug!("Registry token taken from GITPACK_TOKEN");
                config.registry.token = Some(token);
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> GitPackResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| GitPackError::io(format!("reading config from {}", path.display()), e))?;

        serde_json::from_str(&content).map_err(|e| GitPackError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> GitPackResult<()> {
        self.ensure_config_dir().await?;

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            GitPackError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> GitPackResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GitPackError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure the cache directories under `root` exist
    pub async fn ensure_cache_dirs(root: &Path) -> GitPackResult<()> {
        for dir in [Self::tarballs_dir(root), Self::locks_dir(root)] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                GitPackError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }
        Ok(())
    }

    /// Resolve the effective cache root for a loaded config
    pub fn effective_root(config: &Config) -> PathBuf {
        config.cache.root.clone().unwrap_or_else(Self::cache_root)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
