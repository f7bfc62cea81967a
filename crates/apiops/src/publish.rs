//! Wiring of settings to collaborators for one run.

use std::sync::Arc;

use tracing::info;

use crate::artifact::{ArtifactError, DesiredStateBuilder, NativeConverter, OverrideDocument};
use crate::config::PublisherSettings;
use crate::error::Result;
use crate::git::GitRepository;
use crate::remote::HttpRemote;
use crate::sync::{CancelSignal, ChangeSource, Publisher, RunOutcome};

/// Publishes the artifact tree described by `settings` to the live service.
pub async fn publish(settings: &PublisherSettings, cancel: CancelSignal) -> Result<RunOutcome> {
    settings.validate()?;

    // Git reports canonical paths, so the service directory must be too.
    let service_dir = tokio::fs::canonicalize(&settings.service_directory)
        .await
        .map_err(|source| ArtifactError::ReadFile {
            path: settings.service_directory.clone(),
            source,
        })?;

    let overrides = match settings.configuration_path() {
        Some(path) => {
            info!("Loading overrides from {}", path.display());
            OverrideDocument::load(&path).await?
        }
        None => OverrideDocument::empty(),
    };

    let source = match &settings.commit_id {
        Some(commit_id) => {
            let repository = GitRepository::discover(&service_dir).await?;
            ChangeSource::commit(Arc::new(repository), commit_id.clone())
        }
        None => ChangeSource::AllFiles,
    };

    let token = settings.token.resolve()?;
    let remote = HttpRemote::new(&settings.service_url, settings.api_version.clone(), token)?;

    let builder = DesiredStateBuilder::new(service_dir, overrides, Arc::new(NativeConverter));
    Publisher::new(Arc::new(remote), builder, source)
        .run(cancel)
        .await
}
