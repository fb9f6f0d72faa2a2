//! Error types for gitpack
//!
//! All modules use `GitPackResult<T>` as their return type.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gitpack operations
pub type GitPackResult<T> = Result<T, GitPackError>;

/// The build pipeline phase that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Cloning the repository and checking out the commit
    Checkout,
    /// Installing declared dependencies
    Install,
    /// Producing the distributable archive
    Pack,
    /// Computing the content digest / persisting the artifact
    Digest,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Checkout => "checkout",
            Self::Install => "install",
            Self::Pack => "pack",
            Self::Digest => "digest",
        };
        write!(f, "{}", name)
    }
}

/// All errors that can occur in gitpack
#[derive(Error, Debug)]
pub enum GitPackError {
    // Build pipeline errors
    #[error("build failed during {phase}: {stderr}")]
    Build {
        phase: BuildPhase,
        stderr: String,
        code: Option<i32>,
    },

    // Cache tier errors
    #[error("artifact not found in {tier} tier")]
    NotFound { tier: &'static str },

    #[error("artifact {key} not found in any cache tier")]
    NotFoundAnywhere { key: String },

    #[error("local store write failed for {key}: {reason}")]
    Store { key: String, reason: String },

    #[error("registry request failed: {reason}")]
    Registry { reason: String },

    #[error("could not acquire build lock for {key} within {secs}s")]
    LockTimeout { key: String, secs: u64 },

    // Configuration errors
    #[error("invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    #[error("command timed out after {secs}s: {command}")]
    CommandTimeout { command: String, secs: u64 },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl GitPackError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a build phase error from a tool's output
    pub fn build(phase: BuildPhase, stderr: impl Into<String>, code: Option<i32>) -> Self {
        Self::Build {
            phase,
            stderr: stderr.into(),
            code,
        }
    }

    /// Whether this error is a single-tier miss that should drive fallback
    /// to the next tier rather than surface to the caller.
    pub fn is_tier_miss(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFoundAnywhere { .. } => {
                Some("Run: gitpack build <url>#<sha> to build the artifact from source")
            }
            Self::Registry { .. } => Some("Check registry.url and GITPACK_TOKEN"),
            Self::LockTimeout { .. } => {
                Some("Another build for this key is in progress; retry shortly")
            }
            _ => None,
        }
    }
}
