//! A commit history whose answers are set up by the test.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use apiops::git::error::Result;
use apiops::git::{CommitFileRecord, CommitHistory, GitError};

#[derive(Default)]
pub struct ScriptedHistory {
    changed: Mutex<Vec<CommitFileRecord>>,
    previous: Mutex<HashMap<PathBuf, String>>,
}

impl ScriptedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_changed(&self, records: Vec<CommitFileRecord>) {
        *self.changed.lock().unwrap_or_else(PoisonError::into_inner) = records;
    }

    /// Contents of `path` in the parent commit.
    pub fn set_previous(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.previous
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), contents.into());
    }
}

#[async_trait]
impl CommitHistory for ScriptedHistory {
    async fn changed_files(&self, _commit: &str) -> Result<Vec<CommitFileRecord>> {
        Ok(self
            .changed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn previous_contents(&self, commit: &str, path: &Path) -> Result<String> {
        self.previous
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| GitError::NotInCommit {
                commit: format!("{}^", commit),
                path: path.display().to_string(),
            })
    }
}
