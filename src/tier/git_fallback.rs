//! Git fallback tier
//!
//! The tier of last resort: when no cache holds an artifact, snapshot the
//! commit's tree straight from the upstream repository as a tar.gz. This is
//! a source archive, not a built package, so it is read-only and the
//! hierarchy never writes back into it.

use crate::build::git::{validate_commit_sha, GitCli};
use crate::error::{GitPackError, GitPackResult};
use crate::key::ArtifactKey;
use crate::tier::CacheTier;
use async_trait::async_trait;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, warn};

/// The upstream-git fallback tier
pub struct GitFallbackTier {
    git: GitCli,
}

impl GitFallbackTier {
    /// Create a fallback tier with the given per-command timeout
    pub fn new(tool_timeout: Duration) -> Self {
        Self {
            git: GitCli::new(tool_timeout),
        }
    }
}

#[async_trait]
impl CacheTier for GitFallbackTier {
    fn name(&self) -> &'static str {
        "git"
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        false
    }

    /// The upstream repository is the source of truth for its own commits,
    /// so presence is assumed and a stale SHA surfaces as a fetch error.
    async fn has(&self, _key: &ArtifactKey) -> GitPackResult<bool> {
        Ok(true)
    }

    async fn fetch(&self, key: &ArtifactKey) -> GitPackResult<Vec<u8>> {
        validate_commit_sha(&key.commit_sha)?;

        let workspace = TempDir::new()
            .map_err(|e| GitPackError::io("creating fallback workspace", e))?;
        let repo = workspace.path();

        self.git.init(repo).await?;
        self.git.remote_add_origin(repo, &key.repo_url).await?;

        let shallow = self.git.fetch_commit_shallow(repo, &key.commit_sha).await?;
        if !shallow.status.success() {
            // Some servers refuse fetch-by-SHA; fall back to a full fetch.
            warn!(
                "shallow fetch of {} refused, fetching all refs",
                key.commit_sha
            );
            if let Err(e) = self.git.fetch_all(repo).await {
                warn!("full fetch of {} failed: {}", key.repo_url, e);
                return Err(GitPackError::NotFound { tier: "git" });
            }
        }

        let out = repo.join("snapshot.tar.gz");
        self.git
            .archive_commit(repo, &key.commit_sha, &out)
            .await?;

        let bytes = tokio::fs::read(&out)
            .await
            .map_err(|e| GitPackError::io("reading git archive", e))?;
        debug!("git fallback produced {} bytes for {}", bytes.len(), key);
        Ok(bytes)
    }

    async fn store(&self, _key: &ArtifactKey, _bytes: &[u8]) -> GitPackResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(sha: &str) -> ArtifactKey {
        ArtifactKey::new("https://github.com/a/b", sha, "linux-x86_64")
    }

    #[tokio::test]
    async fn tier_is_read_only() {
        let tier = GitFallbackTier::new(Duration::from_secs(5));
        assert!(!tier.writable());
        assert_eq!(tier.name(), "git");
        // store is accepted but writes nothing
        let k = key("0123456789abcdef0123456789abcdef01234567");
        tier.store(&k, b"bytes").await.unwrap();
        assert!(tier.has(&k).await.unwrap());
    }

    #[tokio::test]
    async fn fetch_rejects_partial_sha_before_touching_git() {
        let tier = GitFallbackTier::new(Duration::from_secs(5));
        let result = tier.fetch(&key("abc123")).await;
        assert!(matches!(result, Err(GitPackError::User(_))));
    }
}
