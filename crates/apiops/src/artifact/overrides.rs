//! Centralized override document.
//!
//! The document patches individual resource properties per environment:
//!
//! ```yaml
//! namedValues:
//!   - name: backend-key
//!     properties:
//!       value: "{{ secret }}"
//! apis:
//!   - name: orders
//!     properties:
//!       serviceUrl: https://orders.internal
//!     diagnostics:
//!       - name: applicationinsights
//!         properties:
//!           loggerId: /loggers/prod-insights
//! ```

use std::path::Path;

use serde_json::Value;

use super::error::{ArtifactError, Result};
use crate::resource::ResourceIdentity;

/// Parsed override document.
#[derive(Debug, Clone, Default)]
pub struct OverrideDocument {
    root: Value,
}

impl OverrideDocument {
    /// An empty document that overrides nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a YAML document.
    pub fn from_yaml(path: &Path, contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::empty());
        }
        let root: Value = serde_yaml::from_str(contents).map_err(|e| ArtifactError::ParseYaml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if !root.is_object() && !root.is_null() {
            return Err(ArtifactError::InvalidArtifact {
                path: path.to_path_buf(),
                message: "override document must be a mapping".to_string(),
            });
        }
        Ok(Self { root })
    }

    /// Loads the document from disk.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ArtifactError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::from_yaml(path, &contents)
    }

    /// Returns the override entry for `identity`, following its ancestor chain.
    ///
    /// Kinds without an override section never match.
    pub fn entry(&self, identity: &ResourceIdentity) -> Option<&Value> {
        let scope = match identity.parent() {
            Some(parent) => self.entry(parent)?,
            None => &self.root,
        };
        let section = scope.get(identity.kind().override_section()?)?.as_array()?;
        section.iter().find(|entry| {
            entry.get("name").and_then(Value::as_str) == Some(identity.name().as_str())
        })
    }

    /// Returns the `properties` override for `identity` wrapped the way
    /// resource bodies are shaped.
    pub fn find(&self, identity: &ResourceIdentity) -> Option<Value> {
        let properties = self.entry(identity)?.get("properties")?;
        Some(serde_json::json!({ "properties": properties }))
    }
}
