//! Artifact tree error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading the artifact tree.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON in '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Invalid artifact '{path}': {message}")]
    InvalidArtifact { path: PathBuf, message: String },

    #[error("{identity} requires {ancestor}, but its artifact is missing")]
    MissingAncestor { identity: String, ancestor: String },

    #[error("Specification conversion failed for '{path}': {source}")]
    Conversion {
        path: PathBuf,
        #[source]
        source: ConversionError,
    },

    #[error("Failed to walk service directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Errors raised by a [`SpecificationConverter`](super::SpecificationConverter).
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("document is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to encode JSON: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("conversion to {target} is not supported")]
    Unsupported { target: &'static str },

    #[error("{0}")]
    Converter(String),
}

/// Result type for artifact operations.
pub type Result<T> = std::result::Result<T, ArtifactError>;
