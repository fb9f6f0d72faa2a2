//! Hardened git CLI wrapper
//!
//! All clone/fetch/checkout/archive work shells out to the system git with
//! interactive prompts, LFS smudging, and hooks disabled, inputs validated
//! against flag/traversal injection, and every invocation bounded by a
//! timeout. Shared by the build pipeline and the git fallback tier.

use crate::error::{GitPackError, GitPackResult};
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Validate that a commit SHA or ref does not contain dangerous patterns
pub fn validate_git_ref(value: &str, name: &str) -> GitPackResult<()> {
    if value.is_empty() {
        return Err(GitPackError::User(format!("{} cannot be empty", name)));
    }
    if value.contains("..") {
        return Err(GitPackError::User(format!("{} cannot contain '..'", name)));
    }
    if value.starts_with('-') {
        return Err(GitPackError::User(format!(
            "{} cannot start with '-'",
            name
        )));
    }
    if value.bytes().any(|b| b == 0 || b < 0x20) {
        return Err(GitPackError::User(format!(
            "{} cannot contain control characters",
            name
        )));
    }
    Ok(())
}

/// Validate a full 40-hex commit SHA (shorter refs must be resolved upstream)
pub fn validate_commit_sha(sha: &str) -> GitPackResult<()> {
    if sha.len() != 40 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GitPackError::User(format!(
            "commit must be a full 40-character hex SHA, got '{}'",
            sha
        )));
    }
    Ok(())
}

/// Git CLI wrapper with security hardening and bounded execution
#[derive(Debug, Clone)]
pub struct GitCli {
    git_path: String,
    timeout: Duration,
}

impl GitCli {
    /// Create a new wrapper around the system git
    pub fn new(timeout: Duration) -> Self {
        Self {
            git_path: "git".to_string(),
            timeout,
        }
    }

    /// Create a hardened Command:
    /// - `GIT_TERMINAL_PROMPT=0` - never prompt for credentials
    /// - `GIT_LFS_SKIP_SMUDGE=1` - skip LFS downloads
    /// - `core.hooksPath=` - disable hook execution
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.git_path);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.env("GIT_LFS_SKIP_SMUDGE", "1");
        cmd.args(["-c", "core.hooksPath="]);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run git with the given args, returning the raw output. Spawn failures
    /// and timeouts error; a non-zero exit does not (callers decide).
    pub async fn run(&self, cwd: Option<&Path>, args: &[&str]) -> GitPackResult<Output> {
        debug!("Executing: git {:?}", args);

        let mut cmd = self.command();
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

        let command_line = format!("git {}", args.join(" "));
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(GitPackError::command_failed(command_line, e)),
            Err(_) => Err(GitPackError::CommandTimeout {
                command: command_line,
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Run git and require a successful exit
    pub async fn run_checked(&self, cwd: Option<&Path>, args: &[&str]) -> GitPackResult<Output> {
        let output = self.run(cwd, args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            Err(GitPackError::command_exec(
                format!("git {}", args.join(" ")),
                stderr,
            ))
        }
    }

    /// Shallow-clone (depth 1) a repository into `dest`
    pub async fn clone_shallow(&self, url: &str, dest: &Path) -> GitPackResult<Output> {
        let dest_str = path_str(dest)?;
        self.run(None, &["clone", "--depth=1", "--", url, dest_str])
            .await
    }

    /// Fetch full history into a previously shallow clone.
    ///
    /// A depth-1 clone's fetch refspec covers only the default branch, so
    /// the refspec is widened to all branches (and tags) here; the commit
    /// being looked for may live anywhere in the repository.
    pub async fn fetch_unshallow(&self, repo: &Path) -> GitPackResult<Output> {
        self.run(
            Some(repo),
            &[
                "fetch",
                "--unshallow",
                "--tags",
                "origin",
                "+refs/heads/*:refs/remotes/origin/*",
            ],
        )
        .await
    }

    /// Check out an exact commit by SHA, detached. Never by ref name: the
    /// packaged tree must be byte-for-byte determined by the SHA.
    pub async fn checkout_commit(&self, repo: &Path, sha: &str) -> GitPackResult<Output> {
        validate_git_ref(sha, "commit")?;
        self.run(Some(repo), &["checkout", "--detach", sha]).await
    }

    /// Initialize an empty repository (used by the fallback tier)
    pub async fn init(&self, dir: &Path) -> GitPackResult<Output> {
        self.run_checked(Some(dir), &["init", "--quiet"]).await
    }

    /// Point `origin` at a remote URL
    pub async fn remote_add_origin(&self, repo: &Path, url: &str) -> GitPackResult<Output> {
        self.run_checked(Some(repo), &["remote", "add", "origin", "--", url])
            .await
    }

    /// Fetch exactly one commit, shallow
    pub async fn fetch_commit_shallow(&self, repo: &Path, sha: &str) -> GitPackResult<Output> {
        validate_git_ref(sha, "commit")?;
        self.run(Some(repo), &["fetch", "--depth=1", "origin", sha])
            .await
    }

    /// Fetch everything from origin (fallback when a server refuses
    /// fetch-by-SHA)
    pub async fn fetch_all(&self, repo: &Path) -> GitPackResult<Output> {
        self.run_checked(Some(repo), &["fetch", "origin"]).await
    }

    /// Produce a tar.gz snapshot of a commit's tree
    pub async fn archive_commit(
        &self,
        repo: &Path,
        sha: &str,
        out: &Path,
    ) -> GitPackResult<Output> {
        validate_git_ref(sha, "commit")?;
        let out_str = path_str(out)?;
        self.run_checked(
            Some(repo),
            &[
                "archive",
                "--format=tar.gz",
                &format!("--output={}", out_str),
                sha,
            ],
        )
        .await
    }
}

fn path_str(path: &Path) -> GitPackResult<&str> {
    path.to_str()
        .ok_or_else(|| GitPackError::Internal(format!("path is not valid UTF-8: {:?}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_ref_rejects_empty() {
        assert!(validate_git_ref("", "commit").is_err());
    }

    #[test]
    fn validate_ref_rejects_traversal() {
        assert!(validate_git_ref("foo/../bar", "commit").is_err());
    }

    #[test]
    fn validate_ref_rejects_leading_dash() {
        assert!(validate_git_ref("-upload-pack=evil", "commit").is_err());
    }

    #[test]
    fn validate_ref_rejects_control_chars() {
        assert!(validate_git_ref("abc\0def", "commit").is_err());
        assert!(validate_git_ref("abc\ndef", "commit").is_err());
    }

    #[test]
    fn validate_ref_accepts_shas() {
        assert!(validate_git_ref("0123456789abcdef0123456789abcdef01234567", "commit").is_ok());
    }

    #[test]
    fn validate_commit_sha_requires_full_hex() {
        assert!(validate_commit_sha("0123456789abcdef0123456789abcdef01234567").is_ok());
        assert!(validate_commit_sha("abc123").is_err());
        assert!(validate_commit_sha("zz23456789abcdef0123456789abcdef01234567").is_err());
        assert!(validate_commit_sha("").is_err());
    }

    #[tokio::test]
    async fn checkout_rejects_invalid_commit_before_spawning() {
        let git = GitCli::new(Duration::from_secs(5));
        let result = git
            .checkout_commit(Path::new("/nonexistent"), "-malicious")
            .await;
        assert!(matches!(result, Err(GitPackError::User(_))));
    }

    #[tokio::test]
    async fn run_reports_spawn_failure() {
        let git = GitCli {
            git_path: "/definitely/not/git".to_string(),
            timeout: Duration::from_secs(5),
        };
        let result = git.run(None, &["--version"]).await;
        assert!(matches!(result, Err(GitPackError::CommandFailed { .. })));
    }

    fn git_in(cwd: &Path, args: &[&str]) -> String {
        let out = std::process::Command::new("git")
            .current_dir(cwd)
            .args([
                "-c",
                "user.name=test",
                "-c",
                "user.email=test@example.invalid",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .output()
            .expect("git spawns");
        assert!(
            out.status.success(),
            "git {:?}: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    #[tokio::test]
    async fn unshallow_reaches_non_default_branch_commits() {
        let temp = tempfile::TempDir::new().unwrap();
        let origin = temp.path().join("origin");
        std::fs::create_dir_all(&origin).unwrap();

        git_in(&origin, &["init", "--quiet"]);
        std::fs::write(origin.join("a.txt"), "one").unwrap();
        git_in(&origin, &["add", "."]);
        git_in(&origin, &["commit", "--quiet", "-m", "one"]);
        let default_branch = git_in(&origin, &["rev-parse", "--abbrev-ref", "HEAD"]);

        git_in(&origin, &["checkout", "--quiet", "-b", "side"]);
        std::fs::write(origin.join("b.txt"), "two").unwrap();
        git_in(&origin, &["add", "."]);
        git_in(&origin, &["commit", "--quiet", "-m", "two"]);
        let side_sha = git_in(&origin, &["rev-parse", "HEAD"]);
        git_in(&origin, &["checkout", "--quiet", &default_branch]);

        // file:// forces the non-local transport, so the clone is shallow
        let url = format!("file://{}", origin.display());
        let dest = temp.path().join("clone");
        let git = GitCli::new(Duration::from_secs(30));

        let out = git.clone_shallow(&url, &dest).await.unwrap();
        assert!(out.status.success());

        // The depth-1 default branch cannot reach the side-branch commit
        let out = git.checkout_commit(&dest, &side_sha).await.unwrap();
        assert!(!out.status.success());

        let out = git.fetch_unshallow(&dest).await.unwrap();
        assert!(
            out.status.success(),
            "{}",
            String::from_utf8_lossy(&out.stderr)
        );
        let out = git.checkout_commit(&dest, &side_sha).await.unwrap();
        assert!(
            out.status.success(),
            "{}",
            String::from_utf8_lossy(&out.stderr)
        );
    }
}
