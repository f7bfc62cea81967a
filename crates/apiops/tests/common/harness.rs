//! Test harness for isolated publish runs.
//!
//! The `TestHarness` struct provides:
//! - a temporary service directory to write artifacts into
//! - a recording `InMemoryService` standing in for the live service
//! - a `ScriptedHistory` for commit-scoped runs

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use apiops::artifact::NativeConverter;
use apiops::git::CommitFileRecord;
use apiops::remote::RemoteCall;
use apiops::{
    cancel_pair, CancelSignal, ChangeSource, DesiredStateBuilder, InMemoryService,
    OverrideDocument, PublishError, Publisher, RemoteService, RunOutcome,
};

use super::{CancelOnPut, ScriptedHistory};

pub const COMMIT: &str = "0123abcd";

pub struct TestHarness {
    _temp_dir: TempDir,
    pub service_dir: PathBuf,
    pub remote: Arc<InMemoryService>,
    pub history: Arc<ScriptedHistory>,
    overrides: OverrideDocument,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let service_dir = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            service_dir,
            remote: Arc::new(InMemoryService::new()),
            history: Arc::new(ScriptedHistory::new()),
            overrides: OverrideDocument::empty(),
        }
    }

    /// Uses `yaml` as the override document.
    pub fn with_overrides(mut self, yaml: &str) -> Self {
        self.overrides = OverrideDocument::from_yaml(Path::new("configuration.yaml"), yaml)
            .expect("Invalid override document");
        self
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.service_dir.join(relative)
    }

    /// Writes an artifact file, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.path(relative)).unwrap();
    }

    pub fn upserted(&self, relative: &str) -> CommitFileRecord {
        CommitFileRecord::upserted(self.path(relative))
    }

    pub fn deleted(&self, relative: &str) -> CommitFileRecord {
        CommitFileRecord::deleted(self.path(relative))
    }

    /// Records what `relative` contained in the parent commit.
    pub fn previously(&self, relative: &str, contents: &str) {
        self.history.set_previous(self.path(relative), contents);
    }

    fn publisher(&self, source: ChangeSource) -> Publisher {
        self.publisher_with(self.remote.clone(), source)
    }

    fn publisher_with(&self, remote: Arc<dyn RemoteService>, source: ChangeSource) -> Publisher {
        Publisher::new(
            remote,
            DesiredStateBuilder::new(
                &self.service_dir,
                self.overrides.clone(),
                Arc::new(NativeConverter),
            ),
            source,
        )
    }

    /// Publishes every file in the tree.
    pub async fn run_all_files(&self) -> Result<RunOutcome, PublishError> {
        self.publisher(ChangeSource::AllFiles)
            .run(CancelSignal::never())
            .await
    }

    /// Publishes the given change set as one commit.
    pub async fn run_commit(&self, records: Vec<CommitFileRecord>) -> Result<RunOutcome, PublishError> {
        self.history.set_changed(records);
        self.publisher(ChangeSource::commit(self.history.clone(), COMMIT))
            .run(CancelSignal::never())
            .await
    }

    /// Publishes the given change set and cancels the run while the first
    /// PUT under `prefix` is in flight.
    pub async fn run_commit_cancelled_on_put(
        &self,
        prefix: &str,
        records: Vec<CommitFileRecord>,
    ) -> Result<RunOutcome, PublishError> {
        self.history.set_changed(records);
        let (handle, signal) = cancel_pair();
        let remote = Arc::new(CancelOnPut::new(self.remote.clone(), prefix, handle));
        self.publisher_with(remote, ChangeSource::commit(self.history.clone(), COMMIT))
            .run(signal)
            .await
    }

    pub fn mutations(&self) -> Vec<RemoteCall> {
        self.remote.mutations()
    }

    /// Index of the first mutation targeting exactly `path`.
    pub fn mutation_index(&self, path: &str) -> Option<usize> {
        self.mutations().iter().position(|call| call.path() == path)
    }

    pub fn puts_to(&self, path: &str) -> Vec<Value> {
        self.mutations()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Put(p, body) if p == path => Some(body),
                _ => None,
            })
            .collect()
    }

    pub fn deletes_of(&self, path: &str) -> usize {
        self.mutations()
            .iter()
            .filter(|call| matches!(call, RemoteCall::Delete(p) if p == path))
            .count()
    }

    /// Paths of release objects created in the run.
    pub fn release_puts(&self, api: &str) -> Vec<(String, Value)> {
        let prefix = format!("apis/{}/releases/", api);
        self.mutations()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Put(p, body) if p.starts_with(&prefix) => Some((p, body)),
                _ => None,
            })
            .collect()
    }

    /// Asserts every mutation of `first` precedes every mutation of `second`.
    pub fn assert_before(&self, first: &str, second: &str) {
        let mutations = self.mutations();
        let last_first = mutations
            .iter()
            .rposition(|call| call.path() == first)
            .unwrap_or_else(|| panic!("no mutation of {}", first));
        let first_second = mutations
            .iter()
            .position(|call| call.path() == second)
            .unwrap_or_else(|| panic!("no mutation of {}", second));
        assert!(
            last_first < first_second,
            "{} must be mutated before {}: {:#?}",
            first,
            second,
            mutations
        );
    }
}
