//! npm toolchain wrapper: dependency install, lifecycle scripts, pack
//!
//! Install prefers a lockfile-faithful `npm ci`; when that fails for any
//! reason it falls back once to a best-effort `npm install`. Both attempts
//! happen before the install phase is declared failed.

use crate::error::{GitPackError, GitPackResult};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Package manifest fields the pipeline cares about
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Declared package name
    pub name: Option<String>,
    /// Declared package version
    pub version: Option<String>,
    /// Whether a `prepare` lifecycle script is declared
    pub has_prepare: bool,
}

/// Read the workspace's package.json. An absent or unparsable manifest is
/// not an error: the build proceeds with unknown package info.
pub fn read_manifest(dir: &Path) -> Manifest {
    let path = dir.join("package.json");
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Manifest::default();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) else {
        return Manifest::default();
    };

    Manifest {
        name: value
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        version: value
            .get("version")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        has_prepare: value
            .get("scripts")
            .and_then(|s| s.get("prepare"))
            .is_some(),
    }
}

/// Whether the workspace carries an npm lockfile
pub fn has_lockfile(dir: &Path) -> bool {
    dir.join("package-lock.json").exists() || dir.join("npm-shrinkwrap.json").exists()
}

/// npm CLI wrapper with bounded execution
#[derive(Debug, Clone)]
pub struct NpmCli {
    npm_path: String,
    timeout: Duration,
}

impl NpmCli {
    /// Create a new wrapper around the system npm
    pub fn new(timeout: Duration) -> Self {
        Self {
            npm_path: "npm".to_string(),
            timeout,
        }
    }

    /// Run npm with the given args, returning raw output. Spawn failures and
    /// timeouts error; a non-zero exit does not (callers decide).
    pub async fn run(&self, cwd: &Path, args: &[&str]) -> GitPackResult<Output> {
        debug!("Executing: npm {:?}", args);

        let mut cmd = Command::new(&self.npm_path);
        cmd.current_dir(cwd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let command_line = format!("npm {}", args.join(" "));
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(GitPackError::command_failed(command_line, e)),
            Err(_) => Err(GitPackError::CommandTimeout {
                command: command_line,
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Install dependencies: lockfile-faithful first, best-effort second.
    /// Returns the output of the attempt that succeeded, or the last
    /// failure's output.
    pub async fn install(&self, dir: &Path, skip_scripts: bool) -> GitPackResult<Output> {
        let mut base = vec!["--no-audit", "--no-fund"];
        if skip_scripts {
            base.push("--ignore-scripts");
        }

        if has_lockfile(dir) {
            let mut args = vec!["ci"];
            args.extend_from_slice(&base);
            let output = self.run(dir, &args).await?;
            if output.status.success() {
                return Ok(output);
            }
            debug!("npm ci failed, falling back to npm install");
        }

        let mut args = vec!["install"];
        args.extend_from_slice(&base);
        self.run(dir, &args).await
    }

    /// Run a declared lifecycle script
    pub async fn run_script(&self, dir: &Path, script: &str) -> GitPackResult<Output> {
        self.run(dir, &["run", script]).await
    }

    /// Produce a single distributable tarball of the package tree, returning
    /// its path.
    pub async fn pack(&self, dir: &Path, dest: &Path) -> GitPackResult<(Output, Option<PathBuf>)> {
        let dest_str = dest
            .to_str()
            .ok_or_else(|| GitPackError::Internal(format!("path is not valid UTF-8: {:?}", dest)))?;

        let output = self
            .run(dir, &["pack", "--pack-destination", dest_str])
            .await?;
        if !output.status.success() {
            return Ok((output, None));
        }

        // npm prints the produced filename as the last stdout line; fall
        // back to scanning the destination for a lone tarball.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let named = stdout
            .lines()
            .rev()
            .find(|l| l.trim().ends_with(".tgz"))
            .map(|l| dest.join(l.trim()));

        let tarball = match named {
            Some(path) if path.exists() => Some(path),
            _ => find_tarball(dest),
        };
        Ok((output, tarball))
    }
}

fn find_tarball(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|ext| ext == "tgz"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn manifest_absent_is_default() {
        let temp = TempDir::new().unwrap();
        let manifest = read_manifest(temp.path());
        assert!(manifest.name.is_none());
        assert!(manifest.version.is_none());
        assert!(!manifest.has_prepare);
    }

    #[test]
    fn manifest_unparsable_is_default() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), "{ nope").unwrap();
        let manifest = read_manifest(temp.path());
        assert!(manifest.name.is_none());
    }

    #[test]
    fn manifest_reads_name_version_prepare() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("package.json"),
            r#"{ "name": "left-pad", "version": "1.3.0", "scripts": { "prepare": "node build.js" } }"#,
        )
        .unwrap();

        let manifest = read_manifest(temp.path());
        assert_eq!(manifest.name.as_deref(), Some("left-pad"));
        assert_eq!(manifest.version.as_deref(), Some("1.3.0"));
        assert!(manifest.has_prepare);
    }

    #[test]
    fn lockfile_detection() {
        let temp = TempDir::new().unwrap();
        assert!(!has_lockfile(temp.path()));
        std::fs::write(temp.path().join("package-lock.json"), "{}").unwrap();
        assert!(has_lockfile(temp.path()));
    }

    #[test]
    fn find_tarball_picks_tgz() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("notes.txt"), "x").unwrap();
        assert!(find_tarball(temp.path()).is_none());
        std::fs::write(temp.path().join("pkg-1.0.0.tgz"), "x").unwrap();
        assert_eq!(
            find_tarball(temp.path()).unwrap(),
            temp.path().join("pkg-1.0.0.tgz")
        );
    }
}
