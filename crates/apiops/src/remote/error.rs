//! Remote service error types.

use thiserror::Error;

/// Maximum length of response bodies kept in errors, to avoid log flooding.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors raised while talking to the remote service.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("{method} {path} failed: {source}")]
    Transport {
        method: &'static str,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response of {method} {path}: {message}")]
    Decode {
        method: &'static str,
        path: String,
        message: String,
    },

    #[error("Invalid service URL '{0}'")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Builds a status error with the body truncated.
    pub fn status(method: &'static str, path: impl Into<String>, status: u16, body: &str) -> Self {
        RemoteError::Status {
            method,
            path: path.into(),
            status,
            body: truncate_body(body),
        }
    }

    /// Returns true if the failure is likely transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let cut = (0..=MAX_ERROR_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    }
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
