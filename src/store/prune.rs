//! LRU size-bound eviction for the local tarball store
//!
//! Scans `<commitSha>-<platform>` entry directories, ranks them by an
//! effective last-access timestamp, and deletes oldest-first until the total
//! size fits a configured ceiling. Directories whose SHA prefix is not hex
//! of at least 6 characters are invisible to both accounting and deletion.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Tolerance when deciding whether a filesystem tracks access time at all
const FROZEN_ATIME_TOLERANCE: Duration = Duration::from_secs(1);

/// Minimum hex length for a directory's SHA prefix to count as an entry
const MIN_SHA_PREFIX: usize = 6;

/// Outcome of a prune pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Entries discovered under the tarball root
    pub entries_scanned: u64,
    /// Entries deleted (or, in dry-run, selected for deletion)
    pub entries_deleted: u64,
    /// Bytes freed (or that would be freed)
    pub space_freed: u64,
    /// True when the cache already fit the ceiling and nothing was selected
    pub was_within_limit: bool,
}

#[derive(Debug)]
struct ScannedEntry {
    path: PathBuf,
    size_bytes: u64,
    lru: SystemTime,
}

/// LRU pruner over a tarball store root
#[derive(Debug, Clone)]
pub struct Pruner {
    root: PathBuf,
}

impl Pruner {
    /// Create a pruner for the given tarball root
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Evict oldest-accessed entries until total size fits `max_size_bytes`.
    ///
    /// `dry_run` performs the identical selection without deleting anything.
    /// A per-entry delete failure is logged and skipped; it never aborts the
    /// remaining deletions or fails the pass.
    pub fn prune(&self, max_size_bytes: u64, dry_run: bool) -> PruneReport {
        let mut entries = self.scan();
        let total: u64 = entries.iter().map(|e| e.size_bytes).sum();

        let mut report = PruneReport {
            entries_scanned: entries.len() as u64,
            ..PruneReport::default()
        };

        if total <= max_size_bytes {
            report.was_within_limit = true;
            debug!(
                "cache within limit ({} of {} bytes), nothing to evict",
                total, max_size_bytes
            );
            return report;
        }

        // Oldest access first
        entries.sort_by_key(|e| e.lru);

        let mut remaining = total;
        for entry in entries {
            if remaining <= max_size_bytes {
                break;
            }
            if dry_run {
                debug!("would evict {}", entry.path.display());
            } else if let Err(e) = std::fs::remove_dir_all(&entry.path) {
                warn!("failed to evict {}: {}", entry.path.display(), e);
                continue;
            } else {
                debug!("evicted {}", entry.path.display());
            }
            remaining -= entry.size_bytes;
            report.entries_deleted += 1;
            report.space_freed += entry.size_bytes;
        }

        report
    }

    /// Total size in bytes of all recognized entries
    pub fn total_size(&self) -> u64 {
        self.scan().iter().map(|e| e.size_bytes).sum()
    }

    /// Number of recognized entries
    pub fn entry_count(&self) -> u64 {
        self.scan().len() as u64
    }

    fn scan(&self) -> Vec<ScannedEntry> {
        let mut entries = Vec::new();
        let read_dir = match std::fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(_) => return entries,
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_cache_entry_name(name) {
                continue;
            }

            let size_bytes = dir_size(&path);
            let lru = entry_lru_timestamp(&path);
            entries.push(ScannedEntry {
                path,
                size_bytes,
                lru,
            });
        }
        entries
    }
}

/// Whether a directory name looks like `<commitSha>-<platform>` with a hex
/// SHA prefix of at least 6 characters.
pub fn is_cache_entry_name(name: &str) -> bool {
    let Some((sha, platform)) = name.split_once('-') else {
        return false;
    };
    !platform.is_empty() && sha.len() >= MIN_SHA_PREFIX && sha.chars().all(|c| c.is_ascii_hexdigit())
}

/// The LRU timestamp for one entry: the artifact file's effective access
/// time. Only the artifact counts; a read of the sidecar (a presence probe)
/// must never refresh an entry's eviction rank.
fn entry_lru_timestamp(dir: &Path) -> SystemTime {
    if let Ok(meta) = std::fs::metadata(dir.join(super::ARTIFACT_FILE)) {
        if meta.is_file() {
            return effective_lru_timestamp(&meta);
        }
    }
    // No artifact: fall back to the directory itself
    std::fs::metadata(dir)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// The access-recency value used to rank entries for eviction.
///
/// Some filesystems (notably certain Windows configurations) disable
/// access-time updates, leaving atime frozen at creation. When atime sits
/// within one second of birth time, or is unavailable, fall back to mtime.
pub fn effective_lru_timestamp(meta: &std::fs::Metadata) -> SystemTime {
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let Ok(accessed) = meta.accessed() else {
        return modified;
    };
    if let Ok(created) = meta.created() {
        let delta = match accessed.duration_since(created) {
            Ok(d) => d,
            Err(e) => e.duration(),
        };
        if delta <= FROZEN_ATIME_TOLERANCE {
            return modified;
        }
    }
    accessed
}

fn dir_size(path: &Path) -> u64 {
    let mut total = 0u64;
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            let path = entry.path();
            if let Ok(meta) = std::fs::symlink_metadata(&path) {
                if meta.is_file() {
                    total = total.saturating_add(meta.len());
                } else if meta.is_dir() {
                    total = total.saturating_add(dir_size(&path));
                }
            }
        }
    }
    total
}

/// Format bytes in human-readable form (B, KB, MB, GB)
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
