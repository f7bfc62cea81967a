//! Pure data types describing a change set.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a file changed in the commit being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Added or modified.
    Upserted,
    Deleted,
}

/// One file of a change set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFileRecord {
    /// Absolute path in the working tree.
    pub path: PathBuf,
    pub change: ChangeKind,
}

impl CommitFileRecord {
    pub fn upserted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            change: ChangeKind::Upserted,
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            change: ChangeKind::Deleted,
        }
    }
}
