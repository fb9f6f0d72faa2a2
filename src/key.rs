//! Artifact key derivation and git URL normalization
//!
//! A cache key is the normalized (repository, commit, platform) triple.
//! Two URLs that normalize identically and share a commit SHA and platform
//! must map to the same key so that protocol-equivalent spellings never
//! produce duplicate cache entries. ssh and https are deliberately not
//! folded together: they can resolve to different auth contexts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Normalize a git repository URL to its canonical form.
///
/// Rules, applied in order: lowercase; `github:` shorthand to
/// `https://github.com/`; `git@host:path` and `git+ssh://` to
/// `ssh://git@host/path`; `git+https://` to `https://`; strip trailing
/// slashes; strip a trailing `.git`.
///
/// Malformed input degrades to best-effort trimming rather than an error:
/// a conservative cache miss beats blocking on key derivation.
pub fn normalize_git_url(raw: &str) -> String {
    let mut url = raw.trim().to_lowercase();

    if let Some(rest) = url.strip_prefix("github:") {
        url = format!("https://github.com/{}", rest.trim_start_matches('/'));
    }

    if let Some(rest) = url.strip_prefix("git+ssh://") {
        url = format!("ssh://{}", rest);
    } else if let Some(rest) = url.strip_prefix("git+https://") {
        url = format!("https://{}", rest);
    }

    // scp-like syntax: git@host:path
    if url.starts_with("git@") && !url.contains("://") {
        if let Some((host, path)) = url.trim_start_matches("git@").split_once(':') {
            url = format!("ssh://git@{}/{}", host, path.trim_start_matches('/'));
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    if let Some(stripped) = url.strip_suffix(".git") {
        url = stripped.to_string();
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// The host platform string in `<os>-<arch>` form
pub fn host_platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Identifies one cacheable build output: a normalized repository URL,
/// a full commit SHA, and a target platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Normalized repository URL
    pub repo_url: String,
    /// Full 40-hex commit SHA (resolved upstream; this type never talks to git)
    pub commit_sha: String,
    /// Target platform (`<os>-<arch>`)
    pub platform: String,
}

impl ArtifactKey {
    /// Create a key, normalizing the repository URL
    pub fn new(raw_url: &str, commit_sha: &str, platform: &str) -> Self {
        Self {
            repo_url: normalize_git_url(raw_url),
            commit_sha: commit_sha.trim().to_lowercase(),
            platform: platform.to_string(),
        }
    }

    /// Create a key for the host platform
    pub fn for_host(raw_url: &str, commit_sha: &str) -> Self {
        Self::new(raw_url, commit_sha, &host_platform())
    }

    /// The key string form used across tiers and logs: `<cleanGitUrl>#<commitSha>`
    pub fn as_string(&self) -> String {
        format!("{}#{}", self.repo_url, self.commit_sha)
    }

    /// The remote-tier identifier: SHA-256 of the canonical string form
    pub fn cache_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.as_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.platform.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The human-browsable local directory name: `<commitSha>-<platform>`
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.commit_sha, self.platform)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}
