//! Typed identities for API Management resources.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_REVISION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<root>[^;]+);rev=(?P<rev>\d+)$").unwrap());

/// The kind of resource managed by the publisher.
///
/// The set is closed: every kind has a fixed artifact shape and a fixed
/// remote path shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    NamedValue,
    Tag,
    Gateway,
    VersionSet,
    Backend,
    Logger,
    Diagnostic,
    PolicyFragment,
    ServicePolicy,
    Group,
    Product,
    ProductPolicy,
    ProductGroup,
    ProductTag,
    Api,
    ApiPolicy,
    ApiTag,
    ApiDiagnostic,
    /// Structural parent of operation policies. Operations themselves come
    /// from the API specification and are never published directly.
    ApiOperation,
    ApiOperationPolicy,
    ProductApi,
    GatewayApi,
    Subscription,
}

impl ResourceKind {
    /// Returns the artifact directory that holds one sub-directory per resource.
    pub fn directory(&self) -> Option<&'static str> {
        match self {
            ResourceKind::NamedValue => Some("namedValues"),
            ResourceKind::Tag => Some("tags"),
            ResourceKind::Gateway => Some("gateways"),
            ResourceKind::VersionSet => Some("version sets"),
            ResourceKind::Backend => Some("backends"),
            ResourceKind::Logger => Some("loggers"),
            ResourceKind::Diagnostic | ResourceKind::ApiDiagnostic => Some("diagnostics"),
            ResourceKind::PolicyFragment => Some("policy fragments"),
            ResourceKind::Group => Some("groups"),
            ResourceKind::Product => Some("products"),
            ResourceKind::Api => Some("apis"),
            ResourceKind::ApiOperation => Some("operations"),
            ResourceKind::Subscription => Some("subscriptions"),
            _ => None,
        }
    }

    /// Returns the information file name for kinds described by one.
    pub fn information_file(&self) -> Option<&'static str> {
        match self {
            ResourceKind::NamedValue => Some("namedValueInformation.json"),
            ResourceKind::Tag => Some("tagInformation.json"),
            ResourceKind::Gateway => Some("gatewayInformation.json"),
            ResourceKind::VersionSet => Some("versionSetInformation.json"),
            ResourceKind::Backend => Some("backendInformation.json"),
            ResourceKind::Logger => Some("loggerInformation.json"),
            ResourceKind::Diagnostic => Some("diagnosticInformation.json"),
            ResourceKind::PolicyFragment => Some("policyFragmentInformation.json"),
            ResourceKind::Group => Some("groupInformation.json"),
            ResourceKind::Product => Some("productInformation.json"),
            ResourceKind::Api => Some("apiInformation.json"),
            ResourceKind::ApiDiagnostic => Some("apiDiagnosticInformation.json"),
            ResourceKind::Subscription => Some("subscriptionInformation.json"),
            _ => None,
        }
    }

    /// Returns the collection segment used in remote paths.
    pub fn segment(&self) -> &'static str {
        match self {
            ResourceKind::NamedValue => "namedValues",
            ResourceKind::Tag | ResourceKind::ProductTag | ResourceKind::ApiTag => "tags",
            ResourceKind::Gateway => "gateways",
            ResourceKind::VersionSet => "apiVersionSets",
            ResourceKind::Backend => "backends",
            ResourceKind::Logger => "loggers",
            ResourceKind::Diagnostic | ResourceKind::ApiDiagnostic => "diagnostics",
            ResourceKind::PolicyFragment => "policyFragments",
            ResourceKind::ServicePolicy
            | ResourceKind::ProductPolicy
            | ResourceKind::ApiPolicy
            | ResourceKind::ApiOperationPolicy => "policies",
            ResourceKind::Group | ResourceKind::ProductGroup => "groups",
            ResourceKind::Product => "products",
            ResourceKind::Api | ResourceKind::ProductApi | ResourceKind::GatewayApi => "apis",
            ResourceKind::ApiOperation => "operations",
            ResourceKind::Subscription => "subscriptions",
        }
    }

    /// Returns the section key used for this kind in the override document.
    pub fn override_section(&self) -> Option<&'static str> {
        match self {
            ResourceKind::NamedValue => Some("namedValues"),
            ResourceKind::Tag => Some("tags"),
            ResourceKind::Gateway => Some("gateways"),
            ResourceKind::VersionSet => Some("versionSets"),
            ResourceKind::Backend => Some("backends"),
            ResourceKind::Logger => Some("loggers"),
            ResourceKind::Diagnostic | ResourceKind::ApiDiagnostic => Some("diagnostics"),
            ResourceKind::PolicyFragment => Some("policyFragments"),
            ResourceKind::Group => Some("groups"),
            ResourceKind::Product => Some("products"),
            ResourceKind::Api => Some("apis"),
            ResourceKind::ApiOperation => Some("operations"),
            ResourceKind::Subscription => Some("subscriptions"),
            _ => None,
        }
    }

    /// Association kinds model many-to-many membership under a parent.
    pub fn is_association(&self) -> bool {
        matches!(
            self,
            ResourceKind::ProductGroup
                | ResourceKind::ProductTag
                | ResourceKind::ProductApi
                | ResourceKind::ApiTag
                | ResourceKind::GatewayApi
        )
    }

    /// Policy kinds have a single fixed remote name.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            ResourceKind::ServicePolicy
                | ResourceKind::ProductPolicy
                | ResourceKind::ApiPolicy
                | ResourceKind::ApiOperationPolicy
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Remote name shared by every policy resource.
pub const POLICY_NAME: &str = "policy";

/// A resource name. Only meaningful together with its kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ResourceName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Identity of one remote resource: kind, name and ancestor chain.
///
/// Equality is structural. Two identities that compare equal denote the
/// same remote resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceIdentity {
    kind: ResourceKind,
    name: ResourceName,
    parent: Option<Arc<ResourceIdentity>>,
}

impl ResourceIdentity {
    /// Creates a service-scoped identity.
    pub fn new(kind: ResourceKind, name: impl Into<ResourceName>) -> Self {
        Self {
            kind,
            name: name.into(),
            parent: None,
        }
    }

    /// Creates an identity scoped under `parent`.
    pub fn child_of(
        parent: &ResourceIdentity,
        kind: ResourceKind,
        name: impl Into<ResourceName>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            parent: Some(Arc::new(parent.clone())),
        }
    }

    /// The service policy.
    pub fn service_policy() -> Self {
        Self::new(ResourceKind::ServicePolicy, POLICY_NAME)
    }

    /// The policy attached to `parent`.
    pub fn policy_of(parent: &ResourceIdentity) -> Self {
        let kind = match parent.kind {
            ResourceKind::Product => ResourceKind::ProductPolicy,
            ResourceKind::Api => ResourceKind::ApiPolicy,
            ResourceKind::ApiOperation => ResourceKind::ApiOperationPolicy,
            _ => ResourceKind::ServicePolicy,
        };
        Self::child_of(parent, kind, POLICY_NAME)
    }

    /// The association set of `kind` under `parent`.
    ///
    /// The set itself is named after its collection segment; members are
    /// reconciled as plain names.
    pub fn association_of(parent: &ResourceIdentity, kind: ResourceKind) -> Self {
        Self::child_of(parent, kind, kind.segment())
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    pub fn parent(&self) -> Option<&ResourceIdentity> {
        self.parent.as_deref()
    }

    /// Iterates the ancestor chain, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &ResourceIdentity> {
        std::iter::successors(self.parent(), |identity| identity.parent())
    }

    /// Returns the API name if this is an API identity.
    pub fn api_name(&self) -> Option<RevisionedName> {
        if self.kind == ResourceKind::Api {
            RevisionedName::parse(self.name.as_str())
        } else {
            None
        }
    }

    /// Path of this resource relative to the service URI.
    ///
    /// Association sets resolve to their member collection.
    pub fn remote_path(&self) -> String {
        let mut path = match self.parent() {
            Some(parent) => format!("{}/", parent.remote_path()),
            None => String::new(),
        };
        path.push_str(self.kind.segment());
        if !self.kind.is_association() {
            path.push('/');
            path.push_str(self.name.as_str());
        }
        path
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{} / ", parent)?;
        }
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// An API name that may carry an explicit revision suffix (`name;rev=N`).
///
/// The unrevisioned root name denotes whichever revision is current on the
/// remote service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionedName {
    root: String,
    revision: Option<u32>,
}

impl RevisionedName {
    /// Parses an API name. Rejects malformed suffixes and revision zero.
    pub fn parse(name: &str) -> Option<Self> {
        if !name.contains(";rev=") {
            if name.is_empty() || name.contains(';') {
                return None;
            }
            return Some(Self::root(name));
        }

        let caps = RE_REVISION.captures(name)?;
        let revision: u32 = caps["rev"].parse().ok()?;
        if revision == 0 {
            return None;
        }
        Some(Self {
            root: caps["root"].to_string(),
            revision: Some(revision),
        })
    }

    /// An unrevisioned root name.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            root: name.into(),
            revision: None,
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn revision(&self) -> Option<u32> {
        self.revision
    }

    /// Drops the revision suffix.
    pub fn to_root(&self) -> Self {
        Self::root(self.root.clone())
    }

    /// Returns the same root name pinned to `revision`.
    pub fn with_revision(&self, revision: u32) -> Self {
        Self {
            root: self.root.clone(),
            revision: Some(revision),
        }
    }

    /// The service-scoped API identity for this name.
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(ResourceKind::Api, self.to_string())
    }
}

impl fmt::Display for RevisionedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(revision) => write!(f, "{};rev={}", self.root, revision),
            None => f.write_str(&self.root),
        }
    }
}
