//! Top-level error type for a publish run.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::git::GitError;
use crate::remote::RemoteError;
use crate::resource::ResourceKind;
use crate::secrets::SecretError;
use crate::sync::Phase;

/// Errors that can abort a publish run or fail a single synchronization task.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid API name '{0}'")]
    InvalidApiName(String),

    #[error("Failed to reconcile {} member(s) of '{collection}': {}", .failures.len(), join(.failures))]
    Members {
        collection: String,
        failures: Vec<RemoteError>,
    },

    #[error("{phase} phase failed for {kind}: {}", join(.failures))]
    PhaseFailed {
        phase: Phase,
        kind: ResourceKind,
        failures: Vec<TaskFailure>,
    },

    #[error("Publish run was cancelled")]
    Cancelled,

    /// An outcome shared between callers of the same memoized task.
    #[error(transparent)]
    Shared(Arc<PublishError>),
}

impl PublishError {
    /// True when the error only reflects cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            PublishError::Cancelled => true,
            PublishError::Shared(inner) => inner.is_cancelled(),
            _ => false,
        }
    }
}

impl From<Arc<PublishError>> for PublishError {
    fn from(error: Arc<PublishError>) -> Self {
        PublishError::Shared(error)
    }
}

/// Errors in publisher settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing setting '{name}' (set {env_var} or pass it on the command line)")]
    MissingSetting {
        name: &'static str,
        env_var: &'static str,
    },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// One failed synchronization task.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub identity: String,
    pub error: Arc<PublishError>,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identity, self.error)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_failure_lists_every_task() {
        let error = PublishError::PhaseFailed {
            phase: Phase::Put,
            kind: ResourceKind::Tag,
            failures: vec![
                TaskFailure {
                    identity: "Tag 'a'".to_string(),
                    error: Arc::new(PublishError::InvalidApiName("x".to_string())),
                },
                TaskFailure {
                    identity: "Tag 'b'".to_string(),
                    error: Arc::new(RemoteError::status("PUT", "tags/b", 500, "boom").into()),
                },
            ],
        };
        let message = error.to_string();
        assert!(message.starts_with("put phase failed for Tag"));
        assert!(message.contains("Tag 'a'"));
        assert!(message.contains("tags/b returned 500"));
    }

    #[test]
    fn test_shared_cancellation_is_detected() {
        let shared = PublishError::Shared(Arc::new(PublishError::Cancelled));
        assert!(shared.is_cancelled());
        assert!(!PublishError::InvalidApiName("x".into()).is_cancelled());
    }
}
