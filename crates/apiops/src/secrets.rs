//! Bearer token lookup.
//!
//! The token used against the management endpoint can be given directly, as
//! a mounted file, or through an environment variable. The first configured
//! origin wins and is never combined with the others.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Errors raised while reading the bearer token.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No bearer token configured (set a value, a token file, or a token variable)")]
    NoSourceProvided,

    #[error("Failed to read bearer token from '{}': {source}", path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Bearer token variable '{name}' is not set")]
    EnvVarNotSet { name: String },

    #[error("Bearer token variable '{name}' is not valid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Bearer token from {origin} is empty")]
    Empty { origin: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where the bearer token comes from. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

/// The single origin a token is read from.
#[derive(Debug, PartialEq, Eq)]
enum Origin<'a> {
    Value(&'a str),
    File(PathBuf),
    Env(&'a str),
}

impl SecretSource {
    /// A source that only reads the given environment variable.
    pub fn env(name: impl Into<String>) -> Self {
        Self {
            env_var: Some(name.into()),
            ..Self::default()
        }
    }

    fn origin(&self) -> Option<Origin<'_>> {
        fn set(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|s| !s.is_empty())
        }

        set(&self.value)
            .map(Origin::Value)
            .or_else(|| set(&self.file).map(|path| Origin::File(expand_home(path))))
            .or_else(|| set(&self.env_var).map(Origin::Env))
    }

    /// Reads the token. File contents and variable values are trimmed.
    pub fn resolve(&self) -> Result<SecretString> {
        let (token, origin) = match self.origin().ok_or(SecretError::NoSourceProvided)? {
            Origin::Value(value) => return Ok(SecretString::from(value.to_string())),
            Origin::File(path) => {
                let contents = std::fs::read_to_string(&path).map_err(|source| {
                    SecretError::FileReadError {
                        path: path.clone(),
                        source,
                    }
                })?;
                (contents, format!("file '{}'", path.display()))
            }
            Origin::Env(name) => {
                let value = std::env::var(name).map_err(|e| match e {
                    std::env::VarError::NotPresent => SecretError::EnvVarNotSet {
                        name: name.to_string(),
                    },
                    std::env::VarError::NotUnicode(_) => SecretError::EnvVarNotUnicode {
                        name: name.to_string(),
                    },
                })?;
                (value, format!("variable '{}'", name))
            }
        };

        let token = token.trim();
        if token.is_empty() {
            return Err(SecretError::Empty { origin });
        }
        Ok(SecretString::from(token.to_string()))
    }
}

/// Expands a leading `~` using HOME, then USERPROFILE.
fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) if rest.is_empty() => PathBuf::from(home),
        Some(home) => PathBuf::from(home).join(rest),
        None => PathBuf::from(path),
    }
}
