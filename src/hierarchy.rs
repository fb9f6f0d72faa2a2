//! Multi-tier cache hierarchy
//!
//! Owns the ordered tier list (local disk, then the shared registry, then
//! the upstream-git fallback) and implements the read-through / write-back
//! policy: a hit in a lower tier is propagated into every writable tier
//! above it, and a fetch failure in one tier falls through to the next.

use crate::config::schema::Config;
use crate::config::ConfigManager;
use crate::error::{GitPackError, GitPackResult};
use crate::key::ArtifactKey;
use crate::store::LocalArtifactStore;
use crate::tier::{CacheTier, GitFallbackTier, LocalTier, RegistryTier, TierStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The result of writing one tier during a `store`
#[derive(Debug)]
pub struct TierWriteOutcome {
    /// Tier name
    pub tier: &'static str,
    /// Error message if the write failed; None on success
    pub error: Option<String>,
}

/// A hit served by `get`
#[derive(Debug)]
pub struct CacheHit {
    /// The artifact bytes
    pub bytes: Vec<u8>,
    /// Which tier served the hit
    pub tier: &'static str,
}

/// Ordered collection of cache tiers
pub struct CacheHierarchy {
    tiers: Vec<Arc<dyn CacheTier>>,
}

impl CacheHierarchy {
    /// Build a hierarchy from an explicit tier list, highest priority first
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        Self { tiers }
    }

    /// Build the standard three-tier hierarchy from config: local disk,
    /// the shared registry when configured, and the git fallback.
    pub fn from_config(config: &Config, cache_root: &Path) -> Self {
        let tool_timeout = Duration::from_secs(config.build.tool_timeout_secs);
        let tarballs = ConfigManager::tarballs_dir(cache_root);

        let mut tiers: Vec<Arc<dyn CacheTier>> = Vec::with_capacity(3);
        tiers.push(Arc::new(LocalTier::new(LocalArtifactStore::new(tarballs))));
        if let Some(registry) = RegistryTier::from_config(&config.registry) {
            tiers.push(Arc::new(registry));
        }
        tiers.push(Arc::new(GitFallbackTier::new(tool_timeout)));
        Self::new(tiers)
    }

    /// Whether any tier holds the artifact. Probes in priority order and
    /// stops at the first claim.
    pub async fn has(&self, key: &ArtifactKey) -> bool {
        for tier in &self.tiers {
            if !tier.is_available().await {
                continue;
            }
            match tier.has(key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!("{} tier probe failed for {}: {}", tier.name(), key, e),
            }
        }
        false
    }

    /// Read-through get: probe tiers in order, serve the first hit, and
    /// write the bytes back into every writable tier of higher priority
    /// than the one that served them.
    pub async fn get(&self, key: &ArtifactKey) -> GitPackResult<CacheHit> {
        for (idx, tier) in self.tiers.iter().enumerate() {
            if !tier.is_available().await {
                debug!("{} tier unavailable, skipping", tier.name());
                continue;
            }
            match tier.has(key).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!("{} tier probe failed for {}: {}", tier.name(), key, e);
                    continue;
                }
            }
            match tier.fetch(key).await {
                Ok(bytes) => {
                    info!("cache hit for {} in {} tier", key, tier.name());
                    self.propagate(key, &bytes, idx).await;
                    return Ok(CacheHit {
                        bytes,
                        tier: tier.name(),
                    });
                }
                Err(e) if e.is_tier_miss() => continue,
                Err(e) => {
                    // A claimed hit that fails to materialize falls through
                    // to the next tier instead of failing the whole get.
                    warn!("{} tier fetch failed for {}: {}", tier.name(), key, e);
                    continue;
                }
            }
        }
        Err(GitPackError::NotFoundAnywhere {
            key: key.as_string(),
        })
    }

    /// Write back into every writable tier above `source_idx`. Failures are
    /// logged, never fatal: the caller already has the bytes.
    async fn propagate(&self, key: &ArtifactKey, bytes: &[u8], source_idx: usize) {
        for tier in &self.tiers[..source_idx] {
            if !tier.writable() || !tier.is_available().await {
                continue;
            }
            match tier.store(key, bytes).await {
                Ok(()) => debug!("propagated {} into {} tier", key, tier.name()),
                Err(e) => warn!("write-back to {} tier failed for {}: {}", tier.name(), key, e),
            }
        }
    }

    /// Store into every writable, available tier. Only a failure of the
    /// first writable tier (local disk) fails the operation; remote write
    /// failures are reported in the outcomes and logged.
    pub async fn store(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
    ) -> GitPackResult<Vec<TierWriteOutcome>> {
        let mut outcomes = Vec::new();
        let mut first_writable = true;
        for tier in &self.tiers {
            if !tier.writable() || !tier.is_available().await {
                continue;
            }
            match tier.store(key, bytes).await {
                Ok(()) => outcomes.push(TierWriteOutcome {
                    tier: tier.name(),
                    error: None,
                }),
                Err(e) => {
                    if first_writable {
                        return Err(e);
                    }
                    warn!("store to {} tier failed for {}: {}", tier.name(), key, e);
                    outcomes.push(TierWriteOutcome {
                        tier: tier.name(),
                        error: Some(e.to_string()),
                    });
                }
            }
            first_writable = false;
        }
        Ok(outcomes)
    }

    /// Availability and authentication of every tier, in priority order
    pub async fn status(&self) -> Vec<TierStatus> {
        let mut rows = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            rows.push(TierStatus {
                tier: tier.name(),
                available: tier.is_available().await,
                authenticated: tier.authenticated(),
            });
        }
        rows
    }

    /// Clear local state. Remote tiers are shared and untouched.
    pub async fn clear(&self) -> GitPackResult<u64> {
        let mut removed = 0;
        for tier in &self.tiers {
            removed += tier.clear().await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeTier {
        name: &'static str,
        available: bool,
        writable: bool,
        fail_fetch: bool,
        entries: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeTier {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                available: true,
                writable: true,
                fail_fetch: false,
                entries: Mutex::new(HashMap::new()),
            }
        }

        fn with(self, key: &ArtifactKey, bytes: &[u8]) -> Self {
            self.entries
                .lock()
                .unwrap()
                .insert(key.as_string(), bytes.to_vec());
            self
        }

        fn contains(&self, key: &ArtifactKey) -> bool {
            self.entries.lock().unwrap().contains_key(&key.as_string())
        }
    }

    #[async_trait]
    impl CacheTier for FakeTier {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn writable(&self) -> bool {
            self.writable
        }

        async fn has(&self, key: &ArtifactKey) -> GitPackResult<bool> {
            Ok(self.fail_fetch || self.contains(key))
        }

        async fn fetch(&self, key: &ArtifactKey) -> GitPackResult<Vec<u8>> {
            if self.fail_fetch {
                return Err(GitPackError::Registry {
                    reason: "simulated outage".to_string(),
                });
            }
            self.entries
                .lock()
                .unwrap()
                .get(&key.as_string())
                .cloned()
                .ok_or(GitPackError::NotFound { tier: self.name })
        }

        async fn store(&self, key: &ArtifactKey, bytes: &[u8]) -> GitPackResult<()> {
            if !self.writable {
                return Ok(());
            }
            self.entries
                .lock()
                .unwrap()
                .insert(key.as_string(), bytes.to_vec());
            Ok(())
        }

        async fn clear(&self) -> GitPackResult<u64> {
            let mut entries = self.entries.lock().unwrap();
            let n = entries.len() as u64;
            entries.clear();
            Ok(n)
        }
    }

    fn key() -> ArtifactKey {
        let sha: String = std::iter::repeat('b').take(40).collect();
        ArtifactKey::new("https://github.com/a/b", &sha, "linux-x86_64")
    }

    #[tokio::test]
    async fn get_serves_highest_priority_hit() {
        let k = key();
        let local = Arc::new(FakeTier::new("local").with(&k, b"local-bytes"));
        let remote = Arc::new(FakeTier::new("registry").with(&k, b"remote-bytes"));
        let hierarchy = CacheHierarchy::new(vec![local.clone(), remote]);

        let hit = hierarchy.get(&k).await.unwrap();
        assert_eq!(hit.tier, "local");
        assert_eq!(hit.bytes, b"local-bytes");
    }

    #[tokio::test]
    async fn remote_hit_propagates_to_local() {
        let k = key();
        let local = Arc::new(FakeTier::new("local"));
        let remote = Arc::new(FakeTier::new("registry").with(&k, b"remote-bytes"));
        let hierarchy = CacheHierarchy::new(vec![local.clone(), remote]);

        let hit = hierarchy.get(&k).await.unwrap();
        assert_eq!(hit.tier, "registry");
        assert!(local.contains(&k), "hit must be written back into local");
    }

    #[tokio::test]
    async fn fetch_failure_falls_through() {
        let k = key();
        let local = Arc::new(FakeTier::new("local"));
        let mut broken = FakeTier::new("registry");
        broken.fail_fetch = true;
        let fallback = Arc::new(FakeTier::new("git").with(&k, b"fallback-bytes"));
        let hierarchy = CacheHierarchy::new(vec![local, Arc::new(broken), fallback]);

        let hit = hierarchy.get(&k).await.unwrap();
        assert_eq!(hit.tier, "git");
        assert_eq!(hit.bytes, b"fallback-bytes");
    }

    #[tokio::test]
    async fn total_miss_reports_the_key() {
        let hierarchy = CacheHierarchy::new(vec![Arc::new(FakeTier::new("local"))]);
        let err = hierarchy.get(&key()).await.unwrap_err();
        match err {
            GitPackError::NotFoundAnywhere { key: k } => {
                assert!(k.contains("github.com/a/b"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unavailable_tier_is_skipped() {
        let k = key();
        let mut offline = FakeTier::new("registry");
        offline.available = false;
        let offline = Arc::new(offline.with(&k, b"unreachable"));
        let fallback = Arc::new(FakeTier::new("git").with(&k, b"fallback-bytes"));
        let hierarchy = CacheHierarchy::new(vec![offline, fallback]);

        let hit = hierarchy.get(&k).await.unwrap();
        assert_eq!(hit.tier, "git");
    }

    #[tokio::test]
    async fn store_writes_all_writable_tiers() {
        let k = key();
        let local = Arc::new(FakeTier::new("local"));
        let remote = Arc::new(FakeTier::new("registry"));
        let mut readonly = FakeTier::new("git");
        readonly.writable = false;
        let readonly = Arc::new(readonly);
        let hierarchy = CacheHierarchy::new(vec![local.clone(), remote.clone(), readonly.clone()]);

        let outcomes = hierarchy.store(&k, b"bytes").await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.error.is_none()));
        assert!(local.contains(&k));
        assert!(remote.contains(&k));
        assert!(!readonly.contains(&k));
    }

    #[tokio::test]
    async fn clear_counts_removed_entries() {
        let k = key();
        let local = Arc::new(FakeTier::new("local").with(&k, b"bytes"));
        let hierarchy = CacheHierarchy::new(vec![local]);
        assert_eq!(hierarchy.clear().await.unwrap(), 1);
        assert!(!hierarchy.has(&k).await);
    }
}
