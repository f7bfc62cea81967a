//! Git repository access for commit-scoped publishing.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;

use super::error::{is_missing_path_error, GitError, Result};
use super::parse::{format_git_error, parse_name_status};
use super::types::CommitFileRecord;

/// Read access to the history the publisher needs.
#[async_trait]
pub trait CommitHistory: Send + Sync {
    /// Files added, modified or deleted by `commit`, as absolute paths.
    async fn changed_files(&self, commit: &str) -> Result<Vec<CommitFileRecord>>;

    /// Contents of `path` in the parent of `commit`.
    ///
    /// Fails with [`GitError::NotInCommit`] when the file did not exist there.
    async fn previous_contents(&self, commit: &str, path: &Path) -> Result<String>;
}

/// A git working tree.
#[derive(Debug, Clone)]
pub struct GitRepository {
    /// Top level of the working tree.
    repo_path: PathBuf,
}

impl GitRepository {
    /// Creates a handle for a known repository root.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Finds the repository containing `path`.
    pub async fn discover(path: &Path) -> Result<Self> {
        let output = run_git_in(path, &["rev-parse", "--show-toplevel"]).await?;
        if !output.status.success() {
            return Err(GitError::NotARepository(path.to_path_buf()));
        }

        let top_level = String::from_utf8_lossy(&output.stdout).trim().to_string();
        log::debug!("Discovered git repository at {}", top_level);
        Ok(Self::new(top_level))
    }

    /// Returns the repository path.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Path of `path` relative to the repository root, with `/` separators.
    fn relative_path(&self, path: &Path) -> Result<String> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.repo_path)
                .map_err(|_| GitError::OutsideRepository(path.to_path_buf()))?
        } else {
            path
        };

        Ok(relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }

    /// Runs a git command in the repository directory.
    async fn run_git(&self, args: &[&str]) -> Result<Output> {
        run_git_in(&self.repo_path, args).await
    }
}

#[async_trait]
impl CommitHistory for GitRepository {
    async fn changed_files(&self, commit: &str) -> Result<Vec<CommitFileRecord>> {
        log::info!("Reading files changed by commit {}", commit);

        let output = self
            .run_git(&[
                "diff-tree",
                "--no-commit-id",
                "--name-status",
                "-r",
                "-z",
                "--root",
                commit,
            ])
            .await?;
        if !output.status.success() {
            return Err(GitError::Operation(format_git_error(&output)));
        }

        let records = parse_name_status(&String::from_utf8_lossy(&output.stdout), &self.repo_path)?;
        log::debug!("Commit {} changed {} files", commit, records.len());
        Ok(records)
    }

    async fn previous_contents(&self, commit: &str, path: &Path) -> Result<String> {
        let relative = self.relative_path(path)?;
        let spec = format!("{}^:{}", commit, relative);

        let output = self.run_git(&["show", &spec]).await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_missing_path_error(&stderr) {
            log::debug!("{} is not present in the parent of {}", relative, commit);
            Err(GitError::NotInCommit {
                commit: format!("{}^", commit),
                path: relative,
            })
        } else {
            Err(GitError::Operation(format_git_error(&output)))
        }
    }
}

async fn run_git_in(dir: &Path, args: &[&str]) -> Result<Output> {
    TokioCommand::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .await
        .map_err(|e| GitError::Operation(e.to_string()))
}
