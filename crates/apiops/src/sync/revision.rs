//! Keeps the current revision of an API consistent across environments.
//!
//! The root information file of an API declares which revision should be
//! current. When that number changes between the previous commit and this
//! one, the target service is corrected in three checkpointed steps:
//!
//! 1. create revision `c` derived from the previously current revision `p`
//! 2. flip the current pointer to `c` through a transient release
//! 3. delete `p` unless the artifact tree still references it

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::artifact::{self, DesiredStateBuilder};
use crate::error::{PublishError, Result};
use crate::git::GitError;
use crate::json::property_str;
use crate::remote::RemoteService;
use crate::resource::RevisionedName;

use super::cancel::CancelSignal;
use super::changes::ChangeSource;
use super::memo::Memo;

/// Revision assumed when an information file declares none.
pub const DEFAULT_REVISION: u32 = 1;

/// Prefix of the transient release objects.
const RELEASE_PREFIX: &str = "apiops";

/// Reads the declared revision number of an API document.
///
/// `None` when the declared value is not a positive integer.
pub fn declared_revision_of(document: &Value) -> Option<u32> {
    match property_str(document, "apiRevision") {
        Some(revision) => revision.parse::<u32>().ok().filter(|n| *n > 0),
        None => Some(DEFAULT_REVISION),
    }
}

/// Per-run revision state and the correction sequence.
pub struct RevisionController<'a> {
    remote: &'a dyn RemoteService,
    builder: &'a DesiredStateBuilder,
    source: &'a ChangeSource,
    cancel: CancelSignal,
    previous: Memo<String, std::result::Result<Option<u32>, Arc<PublishError>>>,
    /// Revisions already deleted by a correction in this run.
    retired: Mutex<BTreeSet<RevisionedName>>,
}

impl<'a> RevisionController<'a> {
    pub fn new(
        remote: &'a dyn RemoteService,
        builder: &'a DesiredStateBuilder,
        source: &'a ChangeSource,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            remote,
            builder,
            source,
            cancel,
            previous: Memo::new(),
            retired: Mutex::new(BTreeSet::new()),
        }
    }

    /// The revision the previous commit declared current for `root`.
    ///
    /// `None` without history, or when the information file is new.
    /// Cached per root name for the rest of the run.
    pub async fn previous_revision(&self, root: &str) -> Result<Option<u32>> {
        self.previous
            .get_or_run(root.to_string(), || async {
                self.read_previous_revision(root).await.map_err(Arc::new)
            })
            .await
            .map_err(PublishError::Shared)
    }

    async fn read_previous_revision(&self, root: &str) -> Result<Option<u32>> {
        let ChangeSource::Commit { history, commit_id } = self.source else {
            return Ok(None);
        };

        let identity = RevisionedName::root(root).identity();
        let Some(file) = artifact::canonical_file(&identity) else {
            return Ok(None);
        };
        let path = self.builder.service_dir().join(file);

        let contents = match history.previous_contents(commit_id, &path).await {
            Ok(contents) => contents,
            Err(GitError::NotInCommit { .. }) => {
                debug!("No previous information file for API '{}'", root);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let document: Value = serde_json::from_str(&contents).map_err(|source| {
            artifact::ArtifactError::ParseJson {
                path: path.clone(),
                source,
            }
        })?;
        let revision = declared_revision_of(&document);
        debug!(
            "API '{}' declared revision {:?} in the previous commit",
            root, revision
        );
        Ok(revision)
    }

    /// The revision the current artifact tree declares for `root`.
    ///
    /// `None` when the root information file is gone.
    pub async fn declared_revision(&self, root: &str) -> Result<Option<u32>> {
        let identity = RevisionedName::root(root).identity();
        if !artifact::is_declared(self.builder.service_dir(), &identity).await {
            return Ok(None);
        }
        Ok(self
            .builder
            .find(&identity)
            .await?
            .and_then(|document| declared_revision_of(&document)))
    }

    /// True when the artifact tree still mentions `root;rev=revision`.
    ///
    /// Only this root is consulted: either an explicit revision directory
    /// exists, or the root declares that number as current.
    pub async fn is_revision_referenced(&self, root: &str, revision: u32) -> Result<bool> {
        let pinned = RevisionedName::root(root).with_revision(revision).identity();
        if artifact::is_declared(self.builder.service_dir(), &pinned).await {
            return Ok(true);
        }
        Ok(self.declared_revision(root).await? == Some(revision))
    }

    /// Applies the correction for a changed current revision.
    ///
    /// Cancellation is observed between steps. Stopping after step one leaves
    /// an unused revision; stopping after step two leaves the old revision in
    /// place. Both converge on the next run.
    pub async fn correct(&self, root: &str, previous: u32, current: u32) -> Result<()> {
        let name = RevisionedName::root(root);
        info!(
            "Current revision of API '{}' changed from {} to {}",
            root, previous, current
        );

        self.cancel.check()?;
        self.create_revision(&name, previous, current).await?;

        self.cancel.check()?;
        self.make_current(&name, current).await?;

        self.cancel.check()?;
        if self.is_revision_referenced(root, previous).await? {
            debug!(
                "Keeping revision {} of API '{}': still referenced",
                previous, root
            );
        } else {
            let retired = name.with_revision(previous);
            let path = retired.identity().remote_path();
            info!("Deleting retired revision {}", path);
            self.remote.delete(&path).await?;
            self.retired
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(retired);
        }

        Ok(())
    }

    async fn create_revision(&self, name: &RevisionedName, previous: u32, current: u32) -> Result<()> {
        let path = name.with_revision(current).identity().remote_path();
        let body = json!({
            "properties": {
                "apiRevision": current.to_string(),
                "sourceApiId": format!("/apis/{}", name.with_revision(previous)),
            }
        });
        info!("Creating revision {} from revision {}", path, previous);
        self.remote.put(&path, &body).await?;
        Ok(())
    }

    async fn make_current(&self, name: &RevisionedName, current: u32) -> Result<()> {
        let release = format!("{}-{}", RELEASE_PREFIX, Uuid::new_v4().simple());
        let path = format!("{}/releases/{}", name.identity().remote_path(), release);
        let body = json!({
            "properties": {
                "apiId": format!("/apis/{}", name.with_revision(current)),
                "notes": "Setting current revision",
            }
        });

        // The release is removed even when creating it reported an error.
        info!("Creating release {} for revision {}", path, current);
        let created = self.remote.put(&path, &body).await;
        info!("Deleting release {}", path);
        let deleted = self.remote.delete(&path).await;
        created?;
        deleted?;
        Ok(())
    }

    /// Whether deleting the explicit revision directory `name` should remove
    /// the revision remotely.
    ///
    /// A revision that the root now declares as current was folded into the
    /// root, so its directory going away is not a retirement. Revisions the
    /// correction already removed are not deleted twice.
    pub async fn should_delete_revision(&self, name: &RevisionedName) -> Result<bool> {
        let Some(revision) = name.revision() else {
            return Ok(true);
        };
        let already_retired = self
            .retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name);
        if already_retired {
            debug!("Revision {} was already retired in this run", name);
            return Ok(false);
        }
        let declared = self.declared_revision(name.root_name()).await?;
        Ok(declared != Some(revision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{NativeConverter, OverrideDocument};
    use crate::git::{CommitFileRecord, CommitHistory};
    use crate::remote::{InMemoryService, RemoteCall};
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    struct PreviousInfo(Option<String>);

    #[async_trait]
    impl CommitHistory for PreviousInfo {
        async fn changed_files(&self, _commit: &str) -> crate::git::error::Result<Vec<CommitFileRecord>> {
            Ok(Vec::new())
        }

        async fn previous_contents(&self, commit: &str, path: &Path) -> crate::git::error::Result<String> {
            self.0.clone().ok_or_else(|| GitError::NotInCommit {
                commit: commit.to_string(),
                path: path.display().to_string(),
            })
        }
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn builder(root: &Path) -> DesiredStateBuilder {
        DesiredStateBuilder::new(root, OverrideDocument::empty(), Arc::new(NativeConverter))
    }

    #[test]
    fn test_declared_revision_of() {
        assert_eq!(declared_revision_of(&json!({"properties": {"apiRevision": "3"}})), Some(3));
        assert_eq!(declared_revision_of(&json!({"properties": {"apiRevision": 4}})), Some(4));
        assert_eq!(declared_revision_of(&json!({"properties": {}})), Some(1));
        assert_eq!(declared_revision_of(&json!({"properties": {"apiRevision": "x"}})), None);
        assert_eq!(declared_revision_of(&json!({"properties": {"apiRevision": "0"}})), None);
        assert_eq!(declared_revision_of(&json!({"properties": {"apiRevision": "-1"}})), None);
    }

    #[tokio::test]
    async fn test_previous_revision_from_history() {
        let dir = TempDir::new().unwrap();
        let builder = builder(dir.path());
        let remote = InMemoryService::new();
        let source = ChangeSource::commit(
            Arc::new(PreviousInfo(Some(r#"{"properties":{"apiRevision":"2"}}"#.into()))),
            "abc",
        );
        let controller = RevisionController::new(&remote, &builder, &source, CancelSignal::never());

        assert_eq!(controller.previous_revision("orders").await.unwrap(), Some(2));
        assert_eq!(controller.previous_revision("orders").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_previous_revision_unknown() {
        let dir = TempDir::new().unwrap();
        let builder = builder(dir.path());
        let remote = InMemoryService::new();

        let new_file = ChangeSource::commit(Arc::new(PreviousInfo(None)), "abc");
        let controller = RevisionController::new(&remote, &builder, &new_file, CancelSignal::never());
        assert_eq!(controller.previous_revision("orders").await.unwrap(), None);

        let all_files = ChangeSource::AllFiles;
        let controller = RevisionController::new(&remote, &builder, &all_files, CancelSignal::never());
        assert_eq!(controller.previous_revision("orders").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_correct_runs_steps_in_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "apis/orders/apiInformation.json", r#"{"properties":{"apiRevision":"2"}}"#);
        let builder = builder(dir.path());
        let remote = InMemoryService::new();
        remote.insert("apis/orders;rev=1", json!({}));
        let source = ChangeSource::AllFiles;
        let controller = RevisionController::new(&remote, &builder, &source, CancelSignal::never());

        controller.correct("orders", 1, 2).await.unwrap();

        let mutations = remote.mutations();
        assert_eq!(mutations.len(), 4);
        assert_eq!(
            mutations[0],
            RemoteCall::Put(
                "apis/orders;rev=2".to_string(),
                json!({"properties": {"apiRevision": "2", "sourceApiId": "/apis/orders;rev=1"}})
            )
        );
        let RemoteCall::Put(release, body) = &mutations[1] else {
            panic!("expected a release PUT, got {:?}", mutations[1]);
        };
        assert!(release.starts_with("apis/orders/releases/apiops-"));
        assert_eq!(body["properties"]["apiId"], "/apis/orders;rev=2");
        assert_eq!(mutations[2], RemoteCall::Delete(release.clone()));
        assert_eq!(mutations[3], RemoteCall::Delete("apis/orders;rev=1".to_string()));

        let retired = RevisionedName::parse("orders;rev=1").unwrap();
        assert!(!controller.should_delete_revision(&retired).await.unwrap());
    }

    #[tokio::test]
    async fn test_correct_keeps_referenced_revision() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "apis/orders/apiInformation.json", r#"{"properties":{"apiRevision":"2"}}"#);
        write(dir.path(), "apis/orders;rev=1/apiInformation.json", r#"{"properties":{}}"#);
        let builder = builder(dir.path());
        let remote = InMemoryService::new();
        let source = ChangeSource::AllFiles;
        let controller = RevisionController::new(&remote, &builder, &source, CancelSignal::never());

        controller.correct("orders", 1, 2).await.unwrap();

        assert_eq!(remote.mutations().len(), 3);
        assert!(!remote
            .mutations()
            .contains(&RemoteCall::Delete("apis/orders;rev=1".to_string())));
    }

    #[tokio::test]
    async fn test_correct_stops_at_checkpoint_when_cancelled() {
        let dir = TempDir::new().unwrap();
        let builder = builder(dir.path());
        let remote = InMemoryService::new();
        let source = ChangeSource::AllFiles;
        let (handle, signal) = crate::sync::cancel::cancel_pair();
        handle.cancel();
        let controller = RevisionController::new(&remote, &builder, &source, signal);

        let result = controller.correct("orders", 1, 2).await;
        assert!(matches!(result, Err(PublishError::Cancelled)));
        assert!(remote.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_should_delete_revision() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "apis/orders/apiInformation.json", r#"{"properties":{"apiRevision":"3"}}"#);
        let builder = builder(dir.path());
        let remote = InMemoryService::new();
        let source = ChangeSource::AllFiles;
        let controller = RevisionController::new(&remote, &builder, &source, CancelSignal::never());

        let promoted = RevisionedName::parse("orders;rev=3").unwrap();
        let retired = RevisionedName::parse("orders;rev=2").unwrap();
        assert!(!controller.should_delete_revision(&promoted).await.unwrap());
        assert!(controller.should_delete_revision(&retired).await.unwrap());
    }
}
