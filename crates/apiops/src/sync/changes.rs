//! Turning a change set of files into identities to put and delete.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::artifact::{self, ArtifactError, IdentityResolver};
use crate::error::Result;
use crate::git::{ChangeKind, CommitFileRecord, CommitHistory};
use crate::resource::{ResourceIdentity, ResourceKind};

/// Where the files of a run come from.
#[derive(Clone)]
pub enum ChangeSource {
    /// Every file under the service directory, as if newly added.
    AllFiles,
    /// The files touched by one commit.
    Commit {
        history: Arc<dyn CommitHistory>,
        commit_id: String,
    },
}

impl ChangeSource {
    pub fn commit(history: Arc<dyn CommitHistory>, commit_id: impl Into<String>) -> Self {
        ChangeSource::Commit {
            history,
            commit_id: commit_id.into(),
        }
    }

    /// Lists the file records of this run that lie under `service_dir`.
    pub async fn records(&self, service_dir: &Path) -> Result<Vec<CommitFileRecord>> {
        match self {
            ChangeSource::AllFiles => {
                info!("Publishing all files under {}", service_dir.display());
                all_files(service_dir)
            }
            ChangeSource::Commit { history, commit_id } => {
                info!("Publishing files changed by commit {}", commit_id);
                let records = history.changed_files(commit_id).await?;
                Ok(records
                    .into_iter()
                    .filter(|record| record.path.starts_with(service_dir))
                    .collect())
            }
        }
    }
}

fn all_files(service_dir: &Path) -> Result<Vec<CommitFileRecord>> {
    let mut records = Vec::new();
    for entry in WalkDir::new(service_dir).sort_by_file_name() {
        let entry = entry.map_err(ArtifactError::from)?;
        if entry.file_type().is_file() {
            records.push(CommitFileRecord::upserted(entry.into_path()));
        }
    }
    Ok(records)
}

/// Identities to publish and to remove in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub puts: BTreeSet<ResourceIdentity>,
    pub deletes: BTreeSet<ResourceIdentity>,
}

impl ChangeSet {
    /// Classifies file records into identities.
    ///
    /// A deleted file whose identity is still declared by another artifact
    /// (e.g. a removed specification next to a kept information file) is a
    /// put. An identity never appears in both sets.
    pub async fn classify(resolver: &IdentityResolver, records: &[CommitFileRecord]) -> Self {
        let mut set = ChangeSet::default();

        for record in records {
            let Some(identity) = resolver.try_resolve(&record.path) else {
                debug!("Ignoring {}", record.path.display());
                continue;
            };

            match record.change {
                ChangeKind::Upserted => {
                    set.puts.insert(identity);
                }
                ChangeKind::Deleted => {
                    if artifact::is_declared(resolver.service_dir(), &identity).await {
                        set.puts.insert(identity);
                    } else {
                        set.deletes.insert(identity);
                    }
                }
            }
        }

        let puts = &set.puts;
        set.deletes.retain(|identity| !puts.contains(identity));
        set
    }

    /// Identities of `kind` in the put set.
    pub fn puts_of(&self, kind: ResourceKind) -> Vec<ResourceIdentity> {
        Self::of_kind(&self.puts, kind)
    }

    /// Identities of `kind` in the delete set.
    pub fn deletes_of(&self, kind: ResourceKind) -> Vec<ResourceIdentity> {
        Self::of_kind(&self.deletes, kind)
    }

    fn of_kind(identities: &BTreeSet<ResourceIdentity>, kind: ResourceKind) -> Vec<ResourceIdentity> {
        identities
            .iter()
            .filter(|identity| identity.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}
