//! Maps artifact file paths to resource identities.

use std::path::{Component, Path, PathBuf};

use super::specification::SpecificationFormat;
use super::POLICY_FILE;
use crate::resource::{ResourceIdentity, ResourceKind, RevisionedName};

/// Kinds that may own a `policy.xml`, keyed by their directory marker.
const POLICY_OWNERS: &[ResourceKind] = &[
    ResourceKind::Product,
    ResourceKind::Api,
    ResourceKind::ApiOperation,
    ResourceKind::PolicyFragment,
];

/// Association files: (file name, owning kind, association kind).
const ASSOCIATION_FILES: &[(&str, ResourceKind, ResourceKind)] = &[
    ("apis.json", ResourceKind::Product, ResourceKind::ProductApi),
    ("groups.json", ResourceKind::Product, ResourceKind::ProductGroup),
    ("tags.json", ResourceKind::Product, ResourceKind::ProductTag),
    ("tags.json", ResourceKind::Api, ResourceKind::ApiTag),
    ("apis.json", ResourceKind::Gateway, ResourceKind::GatewayApi),
];

/// Kinds described by an information file inside their own directory.
const INFORMATION_KINDS: &[ResourceKind] = &[
    ResourceKind::NamedValue,
    ResourceKind::Tag,
    ResourceKind::Gateway,
    ResourceKind::VersionSet,
    ResourceKind::Backend,
    ResourceKind::Logger,
    ResourceKind::Diagnostic,
    ResourceKind::PolicyFragment,
    ResourceKind::Group,
    ResourceKind::Product,
    ResourceKind::Api,
    ResourceKind::ApiDiagnostic,
    ResourceKind::Subscription,
];

/// Resolves artifact paths under a service directory.
///
/// Resolution is pure: it never touches the filesystem. Paths that match no
/// known shape resolve to `None`.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    service_dir: PathBuf,
}

impl IdentityResolver {
    /// Creates a resolver rooted at `service_dir`.
    pub fn new(service_dir: impl Into<PathBuf>) -> Self {
        Self {
            service_dir: service_dir.into(),
        }
    }

    /// Returns the service directory.
    pub fn service_dir(&self) -> &Path {
        &self.service_dir
    }

    /// Resolves a path to the identity it describes.
    ///
    /// Absolute paths must lie under the service directory. Relative paths
    /// are taken relative to it.
    pub fn try_resolve(&self, path: &Path) -> Option<ResourceIdentity> {
        let relative = match path.strip_prefix(&self.service_dir) {
            Ok(relative) => relative,
            Err(_) if path.is_relative() => path,
            Err(_) => return None,
        };

        let segments = relative
            .components()
            .map(|component| match component {
                Component::Normal(segment) => segment.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<&str>>>()?;

        let (file, directories) = segments.split_last()?;
        resolve_file(directories, file)
    }
}

fn resolve_file(directories: &[&str], file: &str) -> Option<ResourceIdentity> {
    if file == POLICY_FILE {
        return resolve_policy(directories);
    }

    if let Some(identity) = resolve_association(directories, file) {
        return Some(identity);
    }

    if SpecificationFormat::is_specification_file(file) {
        return resolve_directory(directories, ResourceKind::Api);
    }

    let kind = INFORMATION_KINDS
        .iter()
        .copied()
        .find(|kind| kind.information_file() == Some(file))?;
    resolve_directory(directories, kind)
}

fn resolve_policy(directories: &[&str]) -> Option<ResourceIdentity> {
    if directories.is_empty() {
        return Some(ResourceIdentity::service_policy());
    }

    let owner = POLICY_OWNERS
        .iter()
        .copied()
        .find_map(|kind| resolve_directory(directories, kind))?;

    if owner.kind() == ResourceKind::PolicyFragment {
        // The fragment body is a companion of the fragment itself.
        Some(owner)
    } else {
        Some(ResourceIdentity::policy_of(&owner))
    }
}

fn resolve_association(directories: &[&str], file: &str) -> Option<ResourceIdentity> {
    ASSOCIATION_FILES
        .iter()
        .filter(|(name, _, _)| *name == file)
        .find_map(|(_, owner, association)| {
            let parent = resolve_directory(directories, *owner)?;
            Some(ResourceIdentity::association_of(&parent, *association))
        })
}

/// Walks `directories` upward from the resource name, checking the marker
/// directory at every level of the ancestor chain.
fn resolve_directory(directories: &[&str], kind: ResourceKind) -> Option<ResourceIdentity> {
    let (name, rest) = directories.split_last()?;
    let (marker, ancestors) = rest.split_last()?;

    if Some(*marker) != kind.directory() || !is_valid_name(kind, name) {
        return None;
    }

    match structural_parent(kind) {
        None => ancestors
            .is_empty()
            .then(|| ResourceIdentity::new(kind, *name)),
        Some(parent_kind) => {
            let parent = resolve_directory(ancestors, parent_kind)?;
            Some(ResourceIdentity::child_of(&parent, kind, *name))
        }
    }
}

fn structural_parent(kind: ResourceKind) -> Option<ResourceKind> {
    match kind {
        ResourceKind::ApiDiagnostic | ResourceKind::ApiOperation => Some(ResourceKind::Api),
        _ => None,
    }
}

fn is_valid_name(kind: ResourceKind, name: &str) -> bool {
    match kind {
        ResourceKind::Api => RevisionedName::parse(name).is_some(),
        _ => !name.is_empty() && !name.starts_with('.'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(path: &str) -> Option<ResourceIdentity> {
        IdentityResolver::new("/repo/service").try_resolve(Path::new(path))
    }

    #[test]
    fn test_resolves_information_files() {
        let identity = resolve("/repo/service/namedValues/backend-key/namedValueInformation.json");
        assert_eq!(
            identity,
            Some(ResourceIdentity::new(ResourceKind::NamedValue, "backend-key"))
        );

        let identity = resolve("version sets/orders-set/versionSetInformation.json");
        assert_eq!(
            identity,
            Some(ResourceIdentity::new(ResourceKind::VersionSet, "orders-set"))
        );
    }

    #[test]
    fn test_information_and_specification_share_identity() {
        let info = resolve("apis/orders/apiInformation.json");
        let spec = resolve("apis/orders/specification.yaml");
        assert!(info.is_some());
        assert_eq!(info, spec);
    }

    #[test]
    fn test_resolves_revision_directories() {
        let identity = resolve("apis/orders;rev=2/apiInformation.json").unwrap();
        assert_eq!(identity.api_name().unwrap().revision(), Some(2));
        assert!(resolve("apis/orders;rev=0/apiInformation.json").is_none());
    }

    #[test]
    fn test_resolves_policies_at_every_scope() {
        assert_eq!(resolve("policy.xml"), Some(ResourceIdentity::service_policy()));

        let product = ResourceIdentity::new(ResourceKind::Product, "starter");
        assert_eq!(
            resolve("products/starter/policy.xml"),
            Some(ResourceIdentity::policy_of(&product))
        );

        let api = ResourceIdentity::new(ResourceKind::Api, "orders");
        let operation = ResourceIdentity::child_of(&api, ResourceKind::ApiOperation, "get-order");
        assert_eq!(
            resolve("apis/orders/operations/get-order/policy.xml"),
            Some(ResourceIdentity::policy_of(&operation))
        );

        assert_eq!(
            resolve("policy fragments/retry/policy.xml"),
            Some(ResourceIdentity::new(ResourceKind::PolicyFragment, "retry"))
        );
    }

    #[test]
    fn test_resolves_associations() {
        let product = ResourceIdentity::new(ResourceKind::Product, "starter");
        assert_eq!(
            resolve("products/starter/apis.json"),
            Some(ResourceIdentity::association_of(&product, ResourceKind::ProductApi))
        );

        let api = ResourceIdentity::new(ResourceKind::Api, "orders");
        assert_eq!(
            resolve("apis/orders/tags.json"),
            Some(ResourceIdentity::association_of(&api, ResourceKind::ApiTag))
        );

        let gateway = ResourceIdentity::new(ResourceKind::Gateway, "edge");
        assert_eq!(
            resolve("gateways/edge/apis.json"),
            Some(ResourceIdentity::association_of(&gateway, ResourceKind::GatewayApi))
        );
    }

    #[test]
    fn test_resolves_api_diagnostics() {
        let identity =
            resolve("apis/orders/diagnostics/applicationinsights/apiDiagnosticInformation.json")
                .unwrap();
        assert_eq!(identity.kind(), ResourceKind::ApiDiagnostic);
        assert_eq!(identity.parent().unwrap().name().as_str(), "orders");
    }

    #[test]
    fn test_rejects_structural_mismatches() {
        // Wrong marker directory
        assert!(resolve("api/orders/apiInformation.json").is_none());
        // Information file in the wrong kind's directory
        assert!(resolve("products/orders/apiInformation.json").is_none());
        // Extra nesting above a top-level kind
        assert!(resolve("nested/apis/orders/apiInformation.json").is_none());
        // Operation policy without the operations marker
        assert!(resolve("apis/orders/ops/get/policy.xml").is_none());
        // Diagnostic information under an API is resolved as an API diagnostic only
        assert!(resolve("apis/orders/diagnostics/d/diagnosticInformation.json").is_none());
        // Unknown files
        assert!(resolve("README.md").is_none());
        assert!(resolve("apis/orders/notes.txt").is_none());
    }

    #[test]
    fn test_rejects_paths_outside_service_directory() {
        assert!(resolve("/elsewhere/apis/orders/apiInformation.json").is_none());
        assert!(resolve("../apis/orders/apiInformation.json").is_none());
    }
}
