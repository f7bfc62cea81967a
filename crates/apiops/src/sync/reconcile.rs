//! Set reconciliation of association members.

use std::collections::BTreeSet;

use futures_util::future::join_all;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{PublishError, Result};
use crate::remote::{item_names, RemoteError, RemoteService};

/// Members to add and remove so the remote set equals the desired set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationDelta {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl AssociationDelta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Number of remote mutations the delta needs.
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Computes `desired − existing` and `existing − desired`.
pub fn diff(desired: &BTreeSet<String>, existing: &BTreeSet<String>) -> AssociationDelta {
    AssociationDelta {
        to_add: desired.difference(existing).cloned().collect(),
        to_remove: existing.difference(desired).cloned().collect(),
    }
}

/// Converges the members of `collection` to `desired`.
///
/// Removals run as one parallel batch, then additions as another. A failed
/// member does not stop the others; all failures are reported together.
pub async fn reconcile_associations(
    remote: &dyn RemoteService,
    collection: &str,
    desired: &BTreeSet<String>,
) -> Result<AssociationDelta> {
    let listed = remote.list(collection).await?;
    let existing: BTreeSet<String> = item_names(&listed).map(str::to_string).collect();
    let delta = diff(desired, &existing);

    if delta.is_empty() {
        debug!("Members of {} are up to date", collection);
        return Ok(delta);
    }

    let removals = delta.to_remove.iter().map(|member| async move {
        let path = format!("{}/{}", collection, member);
        info!("Removing association {}", path);
        remote.delete(&path).await
    });
    let mut failures: Vec<RemoteError> = join_all(removals)
        .await
        .into_iter()
        .filter_map(|result| result.err())
        .collect();

    let body = json!({});
    let additions = delta.to_add.iter().map(|member| {
        let body = &body;
        async move {
            let path = format!("{}/{}", collection, member);
            info!("Adding association {}", path);
            remote.put(&path, body).await
        }
    });
    failures.extend(
        join_all(additions)
            .await
            .into_iter()
            .filter_map(|result| result.err()),
    );

    if failures.is_empty() {
        Ok(delta)
    } else {
        Err(PublishError::Members {
            collection: collection.to_string(),
            failures,
        })
    }
}
