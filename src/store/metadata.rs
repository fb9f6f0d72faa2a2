//! Artifact sidecar metadata
//!
//! Every stored artifact has a sibling `metadata.json` recording its origin
//! and a content digest computed once at store time. An entry only counts as
//! present when both the artifact and a parsable sidecar exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Package name/version discovered from the built tree, when available
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Declared package name
    pub name: String,
    /// Declared package version
    pub version: String,
}

/// Sidecar metadata persisted next to each cached artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Normalized repository URL
    pub git_url: String,

    /// Full commit SHA the artifact was built from
    pub commit_sha: String,

    /// Target platform (`<os>-<arch>`)
    pub platform: String,

    /// Content digest of the artifact bytes: `sha256-<hex>`
    pub integrity: String,

    /// When the artifact was built or first stored
    pub build_time: DateTime<Utc>,

    /// Package name/version, when discoverable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_info: Option<PackageInfo>,
}

impl ArtifactMetadata {
    /// Verify some bytes against the recorded integrity digest.
    ///
    /// The digest is never recomputed on read paths; this exists for callers
    /// that want to check an artifact fetched from another tier.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.integrity == integrity_digest(bytes)
    }
}

/// Compute the integrity digest string for artifact bytes
pub fn integrity_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256-{}", hex::encode(hasher.finalize()))
}
