//! The on-disk artifact tree: identity resolution and desired state.
//!
//! A service directory holds one directory per resource, grouped by kind:
//! - `apis/orders/apiInformation.json` plus a `specification.*` document
//! - `apis/orders;rev=2/...` for explicitly pinned revisions
//! - `products/starter/apis.json` for association sets
//! - `policy.xml` files for policies at service, product, API and operation scope

pub mod desired;
pub mod error;
pub mod overrides;
pub mod resolver;
pub mod specification;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

pub use desired::DesiredStateBuilder;
pub use error::{ArtifactError, ConversionError, Result};
pub use overrides::OverrideDocument;
pub use resolver::IdentityResolver;
pub use specification::{NativeConverter, SpecificationConverter, SpecificationFormat};

use crate::resource::{ResourceIdentity, ResourceKind};

/// File name of policy artifacts at every scope.
pub const POLICY_FILE: &str = "policy.xml";

/// Directory of a resource relative to the service directory.
///
/// Policies and association sets live in their parent's directory.
pub fn resource_directory(identity: &ResourceIdentity) -> PathBuf {
    let base = identity
        .parent()
        .map(resource_directory)
        .unwrap_or_default();

    match identity.kind().directory() {
        Some(directory) => base.join(directory).join(identity.name().as_str()),
        None => base,
    }
}

/// The file whose presence means the resource is declared.
///
/// Returns `None` for structural kinds that have no artifact of their own.
pub fn canonical_file(identity: &ResourceIdentity) -> Option<PathBuf> {
    let kind = identity.kind();
    if let Some(file) = kind.information_file() {
        return Some(resource_directory(identity).join(file));
    }
    if kind.is_policy() {
        return Some(resource_directory(identity).join(POLICY_FILE));
    }
    if kind.is_association() {
        return Some(resource_directory(identity).join(format!("{}.json", kind.segment())));
    }
    None
}

/// Returns true when the resource is still declared in the artifact tree.
pub async fn is_declared(service_dir: &Path, identity: &ResourceIdentity) -> bool {
    if let Some(file) = canonical_file(identity) {
        if path_exists(&service_dir.join(file)).await {
            return true;
        }
    }
    // A fragment may be declared by its policy document alone.
    identity.kind() == ResourceKind::PolicyFragment
        && path_exists(&service_dir.join(resource_directory(identity)).join(POLICY_FILE)).await
}

/// Reads a file, mapping "not found" to `None`.
pub async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ArtifactError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Reads and parses a JSON file, mapping "not found" to `None`.
pub async fn read_json(path: &Path) -> Result<Option<Value>> {
    let Some(contents) = read_optional(path).await? else {
        return Ok(None);
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| ArtifactError::ParseJson {
            path: path.to_path_buf(),
            source,
        })
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
