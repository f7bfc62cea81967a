//! The apply orchestrator: put phase, then delete phase.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::artifact::{self, ArtifactError, DesiredStateBuilder, IdentityResolver};
use crate::error::{PublishError, Result, TaskFailure};
use crate::json::is_subset;
use crate::remote::RemoteService;
use crate::resource::{ResourceIdentity, ResourceKind};

use super::cancel::CancelSignal;
use super::changes::{ChangeSet, ChangeSource};
use super::memo::Memo;
use super::phase::Phase;
use super::reconcile::reconcile_associations;
use super::revision::{declared_revision_of, RevisionController};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Cancellation was observed before the run finished.
    Interrupted,
}

/// Outcome of one synchronization task, shared by every caller.
type TaskResult = std::result::Result<(), Arc<PublishError>>;

/// Publishes an artifact tree to a remote service.
pub struct Publisher {
    remote: Arc<dyn RemoteService>,
    builder: DesiredStateBuilder,
    resolver: IdentityResolver,
    source: ChangeSource,
}

impl Publisher {
    pub fn new(remote: Arc<dyn RemoteService>, builder: DesiredStateBuilder, source: ChangeSource) -> Self {
        let resolver = IdentityResolver::new(builder.service_dir());
        Self {
            remote,
            builder,
            resolver,
            source,
        }
    }

    /// Runs the put phase then the delete phase.
    ///
    /// Cancellation is not an error: in-flight tasks stop at their next
    /// checkpoint and the run reports [`RunOutcome::Interrupted`].
    pub async fn run(&self, cancel: CancelSignal) -> Result<RunOutcome> {
        let records = self.source.records(self.builder.service_dir()).await?;
        let changes = ChangeSet::classify(&self.resolver, &records).await;
        if changes.is_empty() {
            info!("{} file(s) changed, nothing to publish", records.len());
            return Ok(RunOutcome::Completed);
        }
        info!(
            "{} file(s) changed: {} resource(s) to put, {} to delete",
            records.len(),
            changes.puts.len(),
            changes.deletes.len()
        );

        let run = PublishRun {
            remote: self.remote.as_ref(),
            builder: &self.builder,
            revisions: RevisionController::new(
                self.remote.as_ref(),
                &self.builder,
                &self.source,
                cancel.clone(),
            ),
            changes,
            cancel,
            puts: Memo::new(),
            deletes: Memo::new(),
        };

        for phase in [Phase::Put, Phase::Delete] {
            if run.run_phase(phase).await? == RunOutcome::Interrupted {
                warn!("Publish interrupted during the {} phase", phase);
                return Ok(RunOutcome::Interrupted);
            }
        }

        info!(
            "Publish completed: {} put task(s), {} delete task(s)",
            run.puts.len(),
            run.deletes.len()
        );
        Ok(RunOutcome::Completed)
    }
}

/// State of a single run.
struct PublishRun<'a> {
    remote: &'a dyn RemoteService,
    builder: &'a DesiredStateBuilder,
    revisions: RevisionController<'a>,
    changes: ChangeSet,
    cancel: CancelSignal,
    puts: Memo<ResourceIdentity, TaskResult>,
    deletes: Memo<ResourceIdentity, TaskResult>,
}

impl<'a> PublishRun<'a> {
    /// Runs every kind step of `phase` in order.
    ///
    /// Tasks are never dropped mid-flight. A cancelled run lets each task
    /// reach its next checkpoint, so multi-step sequences stop only between
    /// steps.
    async fn run_phase(&self, phase: Phase) -> Result<RunOutcome> {
        for kind in phase.kinds() {
            let identities = match phase {
                Phase::Put => self.changes.puts_of(kind),
                Phase::Delete => self.changes.deletes_of(kind),
            };
            if identities.is_empty() {
                continue;
            }
            if self.cancel.is_cancelled() {
                return Ok(RunOutcome::Interrupted);
            }

            let span = info_span!("publish.phase", phase = %phase, kind = %kind, count = identities.len());
            let outcomes = join_all(identities.iter().map(|identity| match phase {
                Phase::Put => self.put(identity),
                Phase::Delete => self.delete(identity),
            }))
            .instrument(span)
            .await;

            let (cancelled, failures): (Vec<TaskFailure>, Vec<TaskFailure>) = identities
                .iter()
                .zip(outcomes)
                .filter_map(|(identity, outcome)| {
                    outcome.err().map(|error| TaskFailure {
                        identity: identity.to_string(),
                        error,
                    })
                })
                .partition(|failure| failure.error.is_cancelled());

            if !failures.is_empty() {
                for failure in &failures {
                    error!("Failed to {} {}", phase, failure);
                }
                return Err(PublishError::PhaseFailed {
                    phase,
                    kind,
                    failures,
                });
            }
            if !cancelled.is_empty() || self.cancel.is_cancelled() {
                debug!("{} task(s) stopped at a cancellation checkpoint", cancelled.len());
                return Ok(RunOutcome::Interrupted);
            }
        }

        Ok(RunOutcome::Completed)
    }

    /// Puts `identity` at most once per run.
    fn put<'s>(&'s self, identity: &'s ResourceIdentity) -> BoxFuture<'s, TaskResult> {
        async move {
            self.puts
                .get_or_run(identity.clone(), || async {
                    self.put_uncached(identity).await.map_err(Arc::new)
                })
                .await
        }
        .boxed()
    }

    /// Deletes `identity` at most once per run.
    fn delete<'s>(&'s self, identity: &'s ResourceIdentity) -> BoxFuture<'s, TaskResult> {
        async move {
            self.deletes
                .get_or_run(identity.clone(), || async {
                    self.delete_uncached(identity).await.map_err(Arc::new)
                })
                .await
        }
        .boxed()
    }

    async fn put_uncached(&self, identity: &ResourceIdentity) -> Result<()> {
        self.cancel.check()?;
        self.ensure_ancestors(identity).await?;

        match identity.kind() {
            kind if kind.is_association() => self.put_association(identity).await,
            ResourceKind::Api => self.put_api(identity).await,
            ResourceKind::ApiOperation => Ok(()),
            _ => self.put_desired(identity).await,
        }
    }

    /// Fails when a declared ancestor has no artifact; waits for ancestors
    /// that are published in this run.
    async fn ensure_ancestors(&self, identity: &ResourceIdentity) -> Result<()> {
        let service_dir = self.builder.service_dir();
        for ancestor in identity
            .ancestors()
            .filter(|ancestor| artifact::canonical_file(ancestor).is_some())
        {
            if !artifact::is_declared(service_dir, ancestor).await {
                return Err(ArtifactError::MissingAncestor {
                    identity: identity.to_string(),
                    ancestor: ancestor.to_string(),
                }
                .into());
            }
            if self.changes.puts.contains(ancestor) {
                self.put(ancestor).await?;
            }
        }
        Ok(())
    }

    async fn put_association(&self, identity: &ResourceIdentity) -> Result<()> {
        let Some(members) = self.builder.find_members(identity).await? else {
            debug!("No association file for {}", identity);
            return Ok(());
        };
        let delta = reconcile_associations(self.remote, &identity.remote_path(), &members).await?;
        if !delta.is_empty() {
            debug!("Applied {} membership change(s) to {}", delta.len(), identity);
        }
        Ok(())
    }

    async fn put_api(&self, identity: &ResourceIdentity) -> Result<()> {
        let name = identity
            .api_name()
            .ok_or_else(|| PublishError::InvalidApiName(identity.name().to_string()))?;

        if name.revision().is_some() {
            // Only the root information file says which revision is current.
            let root = name.to_root().identity();
            if artifact::is_declared(self.builder.service_dir(), &root).await {
                self.put(&root).await?;
            }
            return self.put_desired(identity).await;
        }

        let Some(desired) = self.builder.find(identity).await? else {
            debug!("No desired state for {}", identity);
            return Ok(());
        };
        let current = declared_revision_of(&desired).ok_or_else(|| ArtifactError::InvalidArtifact {
            path: self
                .builder
                .service_dir()
                .join(artifact::canonical_file(identity).unwrap_or_default()),
            message: "apiRevision is not a revision number".to_string(),
        })?;

        let root = name.root_name();
        match self.revisions.previous_revision(root).await? {
            Some(previous) if previous != current => {
                self.revisions.correct(root, previous, current).await?;
            }
            Some(_) => debug!("Current revision of API '{}' is unchanged", root),
            None => debug!("No previous revision known for API '{}'", root),
        }

        self.cancel.check()?;
        self.put_document(identity, &desired).await
    }

    async fn put_desired(&self, identity: &ResourceIdentity) -> Result<()> {
        match self.builder.find(identity).await? {
            Some(desired) => self.put_document(identity, &desired).await,
            None => {
                debug!("No desired state for {}", identity);
                Ok(())
            }
        }
    }

    /// PUTs `desired` unless the remote resource already matches it.
    async fn put_document(&self, identity: &ResourceIdentity, desired: &Value) -> Result<()> {
        let path = identity.remote_path();
        if let Some(existing) = self.remote.get(&path).await? {
            if is_subset(desired, &existing) {
                debug!("{} is up to date", identity);
                return Ok(());
            }
        }

        info!("Putting {}", identity);
        self.remote.put(&path, desired).await?;
        Ok(())
    }

    async fn delete_uncached(&self, identity: &ResourceIdentity) -> Result<()> {
        self.cancel.check()?;
        let kind = identity.kind();

        if kind.is_association() {
            if let Some(parent) = identity.parent() {
                if !artifact::is_declared(self.builder.service_dir(), parent).await {
                    warn!(
                        "Skipping removal of {}: {} was removed as well",
                        identity, parent
                    );
                    return Ok(());
                }
            }
            reconcile_associations(self.remote, &identity.remote_path(), &BTreeSet::new()).await?;
            return Ok(());
        }

        if kind == ResourceKind::ApiOperation {
            return Ok(());
        }

        if kind == ResourceKind::Api {
            let name = identity
                .api_name()
                .ok_or_else(|| PublishError::InvalidApiName(identity.name().to_string()))?;
            if !self.revisions.should_delete_revision(&name).await? {
                info!("Keeping {}: its directory was folded into the root API", identity);
                return Ok(());
            }
        }

        info!("Deleting {}", identity);
        self.remote.delete(&identity.remote_path()).await?;
        Ok(())
    }
}
