//! Local disk tier
//!
//! Thin adapter putting the `LocalArtifactStore` behind the `CacheTier`
//! contract. Highest priority in the hierarchy and the only tier whose
//! write failures are fatal to a `store` operation.

use crate::error::GitPackResult;
use crate::key::ArtifactKey;
use crate::store::LocalArtifactStore;
use crate::tier::CacheTier;
use async_trait::async_trait;

/// The local disk tier
pub struct LocalTier {
    store: LocalArtifactStore,
}

impl LocalTier {
    /// Create a local tier over a store
    pub fn new(store: LocalArtifactStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CacheTier for LocalTier {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn has(&self, key: &ArtifactKey) -> GitPackResult<bool> {
        Ok(self.store.has(key).await)
    }

    async fn fetch(&self, key: &ArtifactKey) -> GitPackResult<Vec<u8>> {
        self.store.get(key).await
    }

    async fn store(&self, key: &ArtifactKey, bytes: &[u8]) -> GitPackResult<()> {
        self.store.store(key, bytes).await
    }

    async fn clear(&self) -> GitPackResult<u64> {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> ArtifactKey {
        let sha: String = std::iter::repeat('a').take(40).collect();
        ArtifactKey::new("https://github.com/a/b", &sha, "linux-x86_64")
    }

    #[tokio::test]
    async fn tier_contract_over_store() {
        let temp = TempDir::new().unwrap();
        let tier = LocalTier::new(LocalArtifactStore::new(temp.path().to_path_buf()));
        let key = key();

        assert!(tier.is_available().await);
        assert!(tier.writable());
        assert_eq!(tier.authenticated(), None);
        assert!(!tier.has(&key).await.unwrap());

        tier.store(&key, b"bytes").await.unwrap();
        assert!(tier.has(&key).await.unwrap());
        assert_eq!(tier.fetch(&key).await.unwrap(), b"bytes");

        assert_eq!(tier.clear().await.unwrap(), 1);
        assert!(!tier.has(&key).await.unwrap());
    }
}
