//! The fixed publishing order over resource kinds.

use std::fmt;

use serde::Serialize;

use crate::resource::ResourceKind;

/// Put-phase order. Every kind appears after all kinds it can reference.
/// The delete phase walks the same list in reverse.
pub const PUT_ORDER: &[ResourceKind] = &[
    ResourceKind::NamedValue,
    ResourceKind::Tag,
    ResourceKind::Gateway,
    ResourceKind::VersionSet,
    ResourceKind::Backend,
    ResourceKind::Logger,
    ResourceKind::Diagnostic,
    ResourceKind::PolicyFragment,
    ResourceKind::ServicePolicy,
    ResourceKind::Group,
    ResourceKind::Product,
    ResourceKind::ProductPolicy,
    ResourceKind::ProductGroup,
    ResourceKind::ProductTag,
    ResourceKind::Api,
    ResourceKind::ApiPolicy,
    ResourceKind::ApiTag,
    ResourceKind::ApiDiagnostic,
    ResourceKind::ApiOperationPolicy,
    ResourceKind::ProductApi,
    ResourceKind::GatewayApi,
    ResourceKind::Subscription,
];

/// One of the two phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Put,
    Delete,
}

impl Phase {
    /// Kinds in the order this phase processes them.
    pub fn kinds(&self) -> Box<dyn Iterator<Item = ResourceKind>> {
        match self {
            Phase::Put => Box::new(PUT_ORDER.iter().copied()),
            Phase::Delete => Box::new(PUT_ORDER.iter().rev().copied()),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Put => f.write_str("put"),
            Phase::Delete => f.write_str("delete"),
        }
    }
}
