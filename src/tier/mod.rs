//! Cache tier abstraction
//!
//! One tier is one cache backend (local disk, shared registry, git
//! fallback) behind a uniform has/fetch/store contract. The hierarchy
//! dispatches through this trait; no tier is ever special-cased by type.

pub mod git_fallback;
pub mod local;
pub mod registry;

pub use git_fallback::GitFallbackTier;
pub use local::LocalTier;
pub use registry::RegistryTier;

use crate::error::GitPackResult;
use crate::key::ArtifactKey;
use async_trait::async_trait;

/// Abstract cache tier interface
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// The tier name for status displays and logs
    fn name(&self) -> &'static str;

    /// Whether the tier can currently serve requests
    async fn is_available(&self) -> bool;

    /// Whether requests carry credentials; None for tiers where the notion
    /// does not apply.
    fn authenticated(&self) -> Option<bool> {
        None
    }

    /// Whether `store` writes anything (read-only tiers return false)
    fn writable(&self) -> bool {
        true
    }

    /// Whether the tier holds an artifact for the key
    async fn has(&self, key: &ArtifactKey) -> GitPackResult<bool>;

    /// Fetch the artifact bytes for the key
    async fn fetch(&self, key: &ArtifactKey) -> GitPackResult<Vec<u8>>;

    /// Store artifact bytes under the key. A no-op on read-only tiers.
    async fn store(&self, key: &ArtifactKey, bytes: &[u8]) -> GitPackResult<()>;

    /// Remove everything this tier holds. Only meaningful for the local
    /// tier; others ignore it.
    async fn clear(&self) -> GitPackResult<u64> {
        Ok(0)
    }
}

/// One row of `gitpack status`
#[derive(Debug, Clone, serde::Serialize)]
pub struct TierStatus {
    /// Tier name
    pub tier: &'static str,
    /// Whether the tier can currently serve requests
    pub available: bool,
    /// Whether requests carry credentials, where applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
}
