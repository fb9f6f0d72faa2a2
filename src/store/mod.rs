//! Content-addressed local artifact store
//!
//! Disk layout: `<root>/<commitSha>-<platform>/package.tgz` plus a sibling
//! `metadata.json`. The store exclusively owns its files; writes go through
//! an atomic write-then-rename so a concurrent reader never observes a
//! half-written artifact. A partial pair (artifact without metadata, or the
//! reverse) is a cache miss, never corrupt-but-present.

pub mod lock;
pub mod metadata;
pub mod prune;

pub use lock::KeyLock;
pub use metadata::{integrity_digest, ArtifactMetadata, PackageInfo};
pub use prune::{PruneReport, Pruner};

use crate::error::{GitPackError, GitPackResult};
use crate::key::ArtifactKey;
use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};

/// Artifact file name inside each entry directory
pub const ARTIFACT_FILE: &str = "package.tgz";
/// Sidecar file name inside each entry directory
pub const METADATA_FILE: &str = "metadata.json";

/// Write bytes to `path` atomically: temp name in the same directory, then
/// rename. The temp name carries the pid, so concurrent processes never
/// collide on it.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> GitPackResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| GitPackError::Internal(format!("bad artifact path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()));

    fs::write(&tmp, bytes)
        .await
        .map_err(|e| GitPackError::io(format!("writing {}", tmp.display()), e))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(GitPackError::io(
            format!("renaming {} into place", path.display()),
            e,
        ));
    }
    Ok(())
}

/// On-disk store keyed by `ArtifactKey`
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Create a store rooted at the tarball directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The tarball root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one entry
    pub fn entry_dir(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.dir_name())
    }

    fn artifact_path(&self, key: &ArtifactKey) -> PathBuf {
        self.entry_dir(key).join(ARTIFACT_FILE)
    }

    fn metadata_path(&self, key: &ArtifactKey) -> PathBuf {
        self.entry_dir(key).join(METADATA_FILE)
    }

    /// Whether a complete entry exists for the key.
    ///
    /// Requires both the artifact file and a parsable sidecar. Never mutates
    /// access time.
    pub async fn has(&self, key: &ArtifactKey) -> bool {
        self.read_metadata(key).await.is_ok() && self.artifact_path(key).exists()
    }

    /// Read an entry's sidecar metadata
    pub async fn read_metadata(&self, key: &ArtifactKey) -> GitPackResult<ArtifactMetadata> {
        let path = self.metadata_path(key);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|_| GitPackError::NotFound { tier: "local" })?;
        serde_json::from_str(&content).map_err(|_| GitPackError::NotFound { tier: "local" })
    }

    /// Fetch an entry's artifact bytes.
    ///
    /// Fails `NotFound` when the entry is absent or its pair is
    /// inconsistent. The only operation that updates last-access time.
    pub async fn get(&self, key: &ArtifactKey) -> GitPackResult<Vec<u8>> {
        // Metadata must parse before the artifact counts as present.
        self.read_metadata(key).await?;

        let path = self.artifact_path(key);
        let bytes = fs::read(&path)
            .await
            .map_err(|_| GitPackError::NotFound { tier: "local" })?;

        self.touch_accessed(&path);
        debug!("local hit for {} ({} bytes)", key, bytes.len());
        Ok(bytes)
    }

    /// Store artifact bytes with a freshly derived sidecar.
    ///
    /// Creates parent directories as needed, then writes artifact and
    /// metadata each through the atomic temp-then-rename pattern. Re-storing
    /// bytes identical to a complete existing entry is a no-op, so a richer
    /// pipeline-written sidecar survives a later fan-out write of the same
    /// artifact.
    pub async fn store(&self, key: &ArtifactKey, bytes: &[u8]) -> GitPackResult<()> {
        if let Ok(existing) = self.read_metadata(key).await {
            if existing.matches(bytes) && self.artifact_path(key).exists() {
                debug!("{} already stored with identical bytes, keeping sidecar", key);
                return Ok(());
            }
        }

        let meta = ArtifactMetadata {
            git_url: key.repo_url.clone(),
            commit_sha: key.commit_sha.clone(),
            platform: key.platform.clone(),
            integrity: integrity_digest(bytes),
            build_time: chrono::Utc::now(),
            package_info: None,
        };
        self.store_with_metadata(key, bytes, meta).await
    }

    /// Store artifact bytes alongside caller-provided metadata (used by the
    /// build pipeline, which knows the package name/version).
    pub async fn store_with_metadata(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
        meta: ArtifactMetadata,
    ) -> GitPackResult<()> {
        let dir = self.entry_dir(key);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| GitPackError::Store {
                key: key.as_string(),
                reason: format!("creating {}: {}", dir.display(), e),
            })?;

        let store_err = |e: GitPackError| GitPackError::Store {
            key: key.as_string(),
            reason: e.to_string(),
        };

        atomic_write(&self.artifact_path(key), bytes)
            .await
            .map_err(store_err)?;

        let sidecar = serde_json::to_vec_pretty(&meta).map_err(|e| GitPackError::Store {
            key: key.as_string(),
            reason: format!("encoding sidecar: {}", e),
        })?;
        atomic_write(&self.metadata_path(key), &sidecar)
            .await
            .map_err(store_err)?;

        debug!("stored {} ({} bytes) in local tier", key, bytes.len());
        Ok(())
    }

    /// Remove one entry. Returns whether anything was deleted.
    pub async fn remove(&self, key: &ArtifactKey) -> GitPackResult<bool> {
        let dir = self.entry_dir(key);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| GitPackError::io(format!("removing {}", dir.display()), e))?;
        Ok(true)
    }

    /// Remove every entry. Returns the number of entries removed.
    pub async fn clear(&self) -> GitPackResult<u64> {
        let mut removed = 0u64;
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return Ok(0),
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match fs::remove_dir_all(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }

    /// Mark the artifact as accessed now. Best-effort: filesystems with
    /// frozen atime are handled by the evictor's fallback rule.
    fn touch_accessed(&self, path: &Path) {
        let times = FileTimes::new().set_accessed(SystemTime::now());
        if let Ok(file) = std::fs::File::options().write(true).open(path) {
            let _ = file.set_times(times);
        }
    }
}
