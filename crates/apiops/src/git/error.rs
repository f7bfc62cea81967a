//! Git collaborator error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading version-control history.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git operation failed: {0}")]
    Operation(String),

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("'{path}' did not exist in {commit}")]
    NotInCommit { commit: String, path: String },

    #[error("Path '{0}' is outside the repository")]
    OutsideRepository(PathBuf),

    #[error("Malformed git output: {0}")]
    MalformedOutput(String),
}

/// Classifies `git show` stderr for a missing blob.
pub fn is_missing_path_error(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("does not exist in")
        || lower.contains("exists on disk, but not in")
        || lower.contains("invalid object name")
        || lower.contains("bad revision")
}

/// Result type for git operations.
pub type Result<T> = std::result::Result<T, GitError>;
