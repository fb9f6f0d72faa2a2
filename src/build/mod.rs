//! Build-from-source pipeline
//!
//! Manufactures a cacheable artifact for an `ArtifactKey` when no tier has
//! one: checkout -> install -> pack -> digest, each phase under a bounded
//! timeout, inside an ephemeral scratch workspace that is removed on every
//! exit path. The finished artifact and its sidecar land in the local store
//! through the atomic write-then-rename pattern.

pub mod git;
pub mod npm;

pub use git::{validate_commit_sha, validate_git_ref, GitCli};
pub use npm::{read_manifest, Manifest, NpmCli};

use crate::config::schema::BuildConfig;
use crate::error::{BuildPhase, GitPackError, GitPackResult};
use crate::key::ArtifactKey;
use crate::store::{integrity_digest, ArtifactMetadata, KeyLock, LocalArtifactStore, PackageInfo};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Caller-facing build options
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Rebuild even when a cached artifact exists
    pub force: bool,
    /// Do not run lifecycle scripts
    pub skip_scripts: bool,
}

/// Outcome of a successful build or cache short-circuit
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// The key the artifact is stored under
    pub key: ArtifactKey,
    /// Where the artifact lives in the local store
    pub artifact_path: PathBuf,
    /// Content digest computed at build time
    pub integrity: String,
    /// When the artifact was built
    pub built_at: DateTime<Utc>,
    /// Package name/version, when discoverable
    pub package_info: Option<PackageInfo>,
    /// True when an existing cached artifact short-circuited the pipeline
    pub from_cache: bool,
}

/// The checkout -> install -> pack -> digest pipeline
#[derive(Debug)]
pub struct SourceBuildPipeline {
    store: LocalArtifactStore,
    locks_dir: PathBuf,
    git: GitCli,
    npm: NpmCli,
    lock_timeout: Duration,
    fan_out: Arc<Semaphore>,
}

impl SourceBuildPipeline {
    /// Create a pipeline writing into `store`, serializing same-key builds
    /// through locks under `locks_dir`.
    pub fn new(store: LocalArtifactStore, locks_dir: PathBuf, config: &BuildConfig) -> Self {
        let tool_timeout = Duration::from_secs(config.tool_timeout_secs);
        Self {
            store,
            locks_dir,
            git: GitCli::new(tool_timeout),
            npm: NpmCli::new(tool_timeout),
            lock_timeout: Duration::from_secs(config.lock_timeout_secs),
            fan_out: Arc::new(Semaphore::new(config.concurrency.max(1))),
        }
    }

    /// Build one artifact, or return the cached result when the key is
    /// already stored and `force` is not set.
    pub async fn build(
        &self,
        key: &ArtifactKey,
        opts: &BuildOptions,
    ) -> GitPackResult<BuildResult> {
        validate_commit_sha(&key.commit_sha)
            .map_err(|e| GitPackError::build(BuildPhase::Checkout, e.to_string(), None))?;

        if !opts.force {
            if let Some(cached) = self.cached_result(key).await {
                debug!("build short-circuit: {} already cached", key);
                return Ok(cached);
            }
        }

        // One build per key per host; a waiter re-checks the store after the
        // winner releases the lock and short-circuits to its artifact.
        let _lock = self.acquire_lock(key).await?;
        if !opts.force {
            if let Some(cached) = self.cached_result(key).await {
                debug!("build short-circuit after lock: {} built elsewhere", key);
                return Ok(cached);
            }
        }

        info!("building {} from source", key);
        let workspace = tempfile::TempDir::new()
            .map_err(|e| GitPackError::io("creating scratch workspace", e))?;
        let repo = workspace.path().join("repo");

        // Phase: checkout
        let out = self
            .git
            .clone_shallow(&key.repo_url, &repo)
            .await
            .map_err(|e| phase_err(BuildPhase::Checkout, e))?;
        ensure_success(BuildPhase::Checkout, &out)?;

        let out = self
            .git
            .checkout_commit(&repo, &key.commit_sha)
            .await
            .map_err(|e| phase_err(BuildPhase::Checkout, e))?;
        if !out.status.success() {
            // Commit unreachable from the shallow history: unshallow once,
            // then check out by SHA again.
            debug!("{} unreachable in shallow clone, unshallowing", key.commit_sha);
            self.git
                .fetch_unshallow(&repo)
                .await
                .and_then(|o| {
                    ensure_success(BuildPhase::Checkout, &o)?;
                    Ok(o)
                })
                .map_err(|e| phase_err(BuildPhase::Checkout, e))?;
            let out = self
                .git
                .checkout_commit(&repo, &key.commit_sha)
                .await
                .map_err(|e| phase_err(BuildPhase::Checkout, e))?;
            ensure_success(BuildPhase::Checkout, &out)?;
        }

        // Phase: install
        let out = self
            .npm
            .install(&repo, opts.skip_scripts)
            .await
            .map_err(|e| phase_err(BuildPhase::Install, e))?;
        ensure_success(BuildPhase::Install, &out)?;

        let manifest = read_manifest(&repo);
        if manifest.has_prepare && !opts.skip_scripts {
            let out = self
                .npm
                .run_script(&repo, "prepare")
                .await
                .map_err(|e| phase_err(BuildPhase::Install, e))?;
            ensure_success(BuildPhase::Install, &out)?;
        }

        // Phase: pack
        let pack_dest = workspace.path().join("out");
        tokio::fs::create_dir_all(&pack_dest)
            .await
            .map_err(|e| GitPackError::io("creating pack destination", e))?;
        let (out, tarball) = self
            .npm
            .pack(&repo, &pack_dest)
            .await
            .map_err(|e| phase_err(BuildPhase::Pack, e))?;
        ensure_success(BuildPhase::Pack, &out)?;
        let tarball = tarball.ok_or_else(|| {
            GitPackError::build(BuildPhase::Pack, "npm pack produced no tarball", None)
        })?;

        // Phase: digest + persist
        let bytes = tokio::fs::read(&tarball)
            .await
            .map_err(|e| GitPackError::build(BuildPhase::Digest, e.to_string(), None))?;
        let integrity = integrity_digest(&bytes);
        let built_at = Utc::now();
        let package_info = match (manifest.name, manifest.version) {
            (Some(name), Some(version)) => Some(PackageInfo { name, version }),
            _ => None,
        };

        let meta = ArtifactMetadata {
            git_url: key.repo_url.clone(),
            commit_sha: key.commit_sha.clone(),
            platform: key.platform.clone(),
            integrity: integrity.clone(),
            build_time: built_at,
            package_info: package_info.clone(),
        };
        self.store.store_with_metadata(key, &bytes, meta).await?;

        info!("built {} ({} bytes)", key, bytes.len());
        Ok(BuildResult {
            artifact_path: self.store.entry_dir(key).join(crate::store::ARTIFACT_FILE),
            key: key.clone(),
            integrity,
            built_at,
            package_info,
            from_cache: false,
        })
        // workspace dropped here: scratch tree removed on every exit path
    }

    /// Build several independent keys concurrently. All builds are issued
    /// together (bounded by the configured fan-out) and joined all-settled:
    /// one failure never cancels the siblings.
    pub async fn build_many(
        self: &Arc<Self>,
        keys: Vec<ArtifactKey>,
        opts: BuildOptions,
    ) -> Vec<(ArtifactKey, GitPackResult<BuildResult>)> {
        let handles: Vec<_> = keys
            .into_iter()
            .map(|key| {
                let pipeline = Arc::clone(self);
                let task_key = key.clone();
                let handle = tokio::spawn(async move {
                    let _permit = pipeline.fan_out.clone().acquire_owned().await;
                    pipeline.build(&task_key, &opts).await
                });
                (key, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("build task for {} aborted: {}", key, e);
                    Err(GitPackError::Internal(format!("build task aborted: {}", e)))
                }
            };
            results.push((key, result));
        }
        results
    }

    async fn cached_result(&self, key: &ArtifactKey) -> Option<BuildResult> {
        if !self.store.has(key).await {
            return None;
        }
        let meta = self.store.read_metadata(key).await.ok()?;
        Some(BuildResult {
            artifact_path: self.store.entry_dir(key).join(crate::store::ARTIFACT_FILE),
            key: key.clone(),
            integrity: meta.integrity,
            built_at: meta.build_time,
            package_info: meta.package_info,
            from_cache: true,
        })
    }

    async fn acquire_lock(&self, key: &ArtifactKey) -> GitPackResult<KeyLock> {
        let locks_dir = self.locks_dir.clone();
        let lock_key = key.clone();
        let timeout = self.lock_timeout;
        let key_string = key.as_string();

        tokio::task::spawn_blocking(move || KeyLock::acquire(&locks_dir, &lock_key, timeout))
            .await
            .map_err(|e| GitPackError::Internal(format!("lock task aborted: {}", e)))?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    GitPackError::LockTimeout {
                        key: key_string,
                        secs: timeout.as_secs(),
                    }
                } else {
                    GitPackError::io("acquiring build lock", e)
                }
            })
    }
}

fn phase_err(phase: BuildPhase, err: GitPackError) -> GitPackError {
    match err {
        GitPackError::Build { .. } | GitPackError::Store { .. } => err,
        GitPackError::CommandExecution { stderr, .. } => GitPackError::build(phase, stderr, None),
        other => GitPackError::build(phase, other.to_string(), None),
    }
}

fn ensure_success(phase: BuildPhase, output: &Output) -> GitPackResult<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    Err(GitPackError::build(phase, stderr, output.status.code()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sha(c: char) -> String {
        std::iter::repeat(c).take(40).collect()
    }

    fn pipeline_in(temp: &TempDir) -> SourceBuildPipeline {
        let store = LocalArtifactStore::new(temp.path().join("tarballs"));
        SourceBuildPipeline::new(
            store,
            temp.path().join("locks"),
            &BuildConfig::default(),
        )
    }

    #[tokio::test]
    async fn rejects_short_commit_sha() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline_in(&temp);
        let key = ArtifactKey::new("https://github.com/a/b", "abc123", "linux-x86_64");

        let err = pipeline.build(&key, &BuildOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            GitPackError::Build {
                phase: BuildPhase::Checkout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cached_artifact_short_circuits() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline_in(&temp);
        let key = ArtifactKey::new("https://github.com/a/b", &sha('a'), "linux-x86_64");

        // Seed the store directly; a build must not touch git at all.
        pipeline.store.store(&key, b"prebuilt").await.unwrap();

        let result = pipeline.build(&key, &BuildOptions::default()).await.unwrap();
        assert!(result.from_cache);
        assert_eq!(result.integrity, integrity_digest(b"prebuilt"));
        assert_eq!(result.key, key);

        // And it is idempotent: the second call returns the same record.
        let again = pipeline.build(&key, &BuildOptions::default()).await.unwrap();
        assert!(again.from_cache);
        assert_eq!(again.integrity, result.integrity);
        assert_eq!(again.built_at, result.built_at);
    }

    #[tokio::test]
    async fn build_many_settles_all() {
        let temp = TempDir::new().unwrap();
        let pipeline = Arc::new(pipeline_in(&temp));

        let good = ArtifactKey::new("https://github.com/a/b", &sha('a'), "linux-x86_64");
        pipeline.store.store(&good, b"cached").await.unwrap();
        // Invalid SHA fails fast without touching the network.
        let bad = ArtifactKey::new("https://github.com/a/c", "nope", "linux-x86_64");

        let results = pipeline
            .build_many(vec![good.clone(), bad.clone()], BuildOptions::default())
            .await;

        assert_eq!(results.len(), 2);
        let good_result = results.iter().find(|(k, _)| *k == good).unwrap();
        assert!(good_result.1.is_ok());
        let bad_result = results.iter().find(|(k, _)| *k == bad).unwrap();
        assert!(bad_result.1.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires network access plus git and npm on PATH
    async fn builds_a_real_repository() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline_in(&temp);
        // left-pad 1.3.0
        let key = ArtifactKey::new(
            "https://github.com/left-pad/left-pad",
            "813b3e202b1d7b7505f52a714bffbd6274817d47",
            "linux-x86_64",
        );

        let result = pipeline.build(&key, &BuildOptions::default()).await.unwrap();
        assert!(!result.from_cache);
        assert!(result.artifact_path.exists());
        assert!(result.integrity.starts_with("sha256-"));

        let again = pipeline.build(&key, &BuildOptions::default()).await.unwrap();
        assert!(again.from_cache);
    }
}
