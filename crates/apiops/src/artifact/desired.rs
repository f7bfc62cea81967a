//! Desired-state builder: artifact files layered with the override document.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use super::error::{ArtifactError, Result};
use super::overrides::OverrideDocument;
use super::specification::{self, SpecificationConverter, SPECIFICATION_FILES};
use super::{canonical_file, read_json, read_optional, resource_directory, POLICY_FILE};
use crate::json::deep_merge;
use crate::resource::{ResourceIdentity, ResourceKind};

/// Builds the representation a resource should have on the remote service.
pub struct DesiredStateBuilder {
    service_dir: PathBuf,
    overrides: OverrideDocument,
    converter: Arc<dyn SpecificationConverter>,
}

impl DesiredStateBuilder {
    pub fn new(
        service_dir: impl Into<PathBuf>,
        overrides: OverrideDocument,
        converter: Arc<dyn SpecificationConverter>,
    ) -> Self {
        Self {
            service_dir: service_dir.into(),
            overrides,
            converter,
        }
    }

    pub fn service_dir(&self) -> &Path {
        &self.service_dir
    }

    /// Returns the merged desired document, or `None` when the resource has
    /// no desired state.
    ///
    /// Layers, lowest precedence first: the information file, any companion
    /// content file (policy body, specification), the override entry.
    /// Secret named values without a usable value are suppressed with a
    /// warning.
    pub async fn find(&self, identity: &ResourceIdentity) -> Result<Option<Value>> {
        let kind = identity.kind();
        if kind.is_association() || kind == ResourceKind::ApiOperation {
            return Ok(None);
        }

        let base = if kind.is_policy() {
            self.read_policy(&self.artifact_path(identity, POLICY_FILE))
                .await?
        } else {
            match kind {
                ResourceKind::PolicyFragment => self.read_fragment(identity).await?,
                ResourceKind::Api => self.read_api(identity).await?,
                _ => self.read_information(identity).await?,
            }
        };

        let desired = match (base, self.overrides.find(identity)) {
            (Some(mut document), Some(overlay)) => {
                deep_merge(&mut document, &overlay);
                Some(document)
            }
            (None, overlay) => overlay,
            (document, None) => document,
        };

        if kind == ResourceKind::NamedValue {
            if let Some(document) = &desired {
                if !is_usable_named_value(document) {
                    warn!(
                        resource = %identity,
                        "Skipping secret named value: no value or key vault reference is configured"
                    );
                    return Ok(None);
                }
            }
        }

        Ok(desired)
    }

    /// Returns the member names declared by an association file.
    pub async fn find_members(
        &self,
        identity: &ResourceIdentity,
    ) -> Result<Option<BTreeSet<String>>> {
        let Some(file) = canonical_file(identity) else {
            return Ok(None);
        };
        let path = self.service_dir.join(file);
        let Some(document) = read_json(&path).await? else {
            return Ok(None);
        };

        let entries = document
            .as_array()
            .ok_or_else(|| ArtifactError::InvalidArtifact {
                path: path.clone(),
                message: "association file must be a JSON array".to_string(),
            })?;

        entries
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .or_else(|| entry.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .ok_or_else(|| ArtifactError::InvalidArtifact {
                        path: path.clone(),
                        message: format!("association entry without a name: {}", entry),
                    })
            })
            .collect::<Result<BTreeSet<_>>>()
            .map(Some)
    }

    fn artifact_path(&self, identity: &ResourceIdentity, file: &str) -> PathBuf {
        self.service_dir.join(resource_directory(identity)).join(file)
    }

    async fn read_information(&self, identity: &ResourceIdentity) -> Result<Option<Value>> {
        match canonical_file(identity) {
            Some(file) => read_json(&self.service_dir.join(file)).await,
            None => Ok(None),
        }
    }

    async fn read_policy(&self, path: &Path) -> Result<Option<Value>> {
        Ok(read_optional(path)
            .await?
            .map(|xml| json!({ "properties": { "format": "rawxml", "value": xml } })))
    }

    async fn read_fragment(&self, identity: &ResourceIdentity) -> Result<Option<Value>> {
        let information = self.read_information(identity).await?;
        let policy = self
            .read_policy(&self.artifact_path(identity, POLICY_FILE))
            .await?;

        Ok(match (information, policy) {
            (Some(mut document), Some(policy)) => {
                deep_merge(&mut document, &policy);
                Some(document)
            }
            (document, None) => document,
            (None, policy) => policy,
        })
    }

    async fn read_api(&self, identity: &ResourceIdentity) -> Result<Option<Value>> {
        let Some(mut document) = self.read_information(identity).await? else {
            return Ok(None);
        };

        for file in SPECIFICATION_FILES {
            let path = self.artifact_path(identity, file);
            if let Some(contents) = read_optional(&path).await? {
                let prepared = specification::prepare(&path, contents, self.converter.as_ref())?;
                deep_merge(
                    &mut document,
                    &json!({
                        "properties": {
                            "format": prepared.format.wire_format(),
                            "value": prepared.value,
                        }
                    }),
                );
                break;
            }
        }

        Ok(Some(document))
    }
}

fn is_usable_named_value(document: &Value) -> bool {
    let properties = &document["properties"];
    if properties["secret"].as_bool() != Some(true) {
        return true;
    }
    let non_empty = |value: &Value| value.as_str().is_some_and(|s| !s.is_empty());
    non_empty(&properties["value"]) || non_empty(&properties["keyVault"]["secretIdentifier"])
}
