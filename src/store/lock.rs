//! Advisory per-key build locks
//!
//! At most one build per artifact key proceeds at a time on a host; a
//! waiter re-checks the store after the winner releases the lock instead of
//! rebuilding. Cross-host writers still converge through the store's atomic
//! write-then-rename.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::key::ArtifactKey;

/// A guard holding an exclusive build lock for one key.
/// Released when dropped.
#[derive(Debug)]
pub struct KeyLock {
    _file: File,
}

impl KeyLock {
    /// Lock file path for a key under the locks directory
    pub fn path_for(locks_dir: &Path, key: &ArtifactKey) -> PathBuf {
        locks_dir.join(format!("{}.lock", key.cache_id()))
    }

    /// Acquire the lock for `key`, blocking with backoff until available or
    /// until `timeout` elapses (`ErrorKind::TimedOut`).
    pub fn acquire(locks_dir: &Path, key: &ArtifactKey, timeout: Duration) -> io::Result<Self> {
        let lock_path = Self::path_for(locks_dir, key);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let start = Instant::now();
        let mut sleep_duration = Duration::from_millis(10);
        let max_sleep = Duration::from_millis(500);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { _file: file }),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("lock acquisition timed out after {:?}", timeout),
                        ));
                    }
                    std::thread::sleep(sleep_duration);
                    sleep_duration = (sleep_duration * 2).min(max_sleep);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Try to acquire without blocking. Returns None when another process
    /// holds the lock.
    pub fn try_acquire(locks_dir: &Path, key: &ArtifactKey) -> io::Result<Option<Self>> {
        let lock_path = Self::path_for(locks_dir, key);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}
