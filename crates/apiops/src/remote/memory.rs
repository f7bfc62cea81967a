//! In-memory [`RemoteService`] that records every call.
//!
//! Resources are stored by path. Listing a collection returns the direct
//! children of that path, each with its `name` injected. Calls are recorded in
//! issue order so tests can assert on the exact mutation sequence.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::error::{RemoteError, Result};
use super::RemoteService;

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Get(String),
    List(String),
    Put(String, Value),
    Delete(String),
}

impl RemoteCall {
    /// The path the call targeted.
    pub fn path(&self) -> &str {
        match self {
            RemoteCall::Get(path)
            | RemoteCall::List(path)
            | RemoteCall::Put(path, _)
            | RemoteCall::Delete(path) => path,
        }
    }

    /// PUT and DELETE calls change remote state.
    pub fn is_mutation(&self) -> bool {
        matches!(self, RemoteCall::Put(..) | RemoteCall::Delete(_))
    }
}

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<String, Value>,
    calls: Vec<RemoteCall>,
    failing: HashSet<String>,
}

/// Recording in-memory service.
#[derive(Debug, Default)]
pub struct InMemoryService {
    state: Mutex<State>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a resource without recording a call.
    pub fn insert(&self, path: impl Into<String>, body: Value) {
        self.state().resources.insert(path.into(), body);
    }

    /// Makes every mutation of `path` fail with a 500.
    pub fn fail_mutations_of(&self, path: impl Into<String>) {
        self.state().failing.insert(path.into());
    }

    /// Returns the stored body at `path`.
    pub fn resource(&self, path: &str) -> Option<Value> {
        self.state().resources.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state().resources.contains_key(path)
    }

    /// Names of the direct children of a collection.
    pub fn member_names(&self, collection: &str) -> Vec<String> {
        let prefix = format!("{}/", collection);
        self.state()
            .resources
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect()
    }

    /// Every recorded call, in issue order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Recorded PUT and DELETE calls, in issue order.
    pub fn mutations(&self) -> Vec<RemoteCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    /// Forgets recorded calls, keeping stored resources.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn check_failure(state: &State, method: &'static str, path: &str) -> Result<()> {
        if state.failing.contains(path) {
            Err(RemoteError::status(method, path, 500, "injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteService for InMemoryService {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let mut state = self.state();
        state.calls.push(RemoteCall::Get(path.to_string()));
        Ok(state.resources.get(path).cloned())
    }

    async fn list(&self, path: &str) -> Result<Vec<Value>> {
        let mut state = self.state();
        state.calls.push(RemoteCall::List(path.to_string()));

        let prefix = format!("{}/", path);
        Ok(state
            .resources
            .iter()
            .filter_map(|(key, body)| {
                let name = key.strip_prefix(&prefix)?;
                if name.contains('/') {
                    return None;
                }
                let mut item = match body {
                    Value::Object(_) => body.clone(),
                    _ => Value::Object(Default::default()),
                };
                item["name"] = Value::String(name.to_string());
                Some(item)
            })
            .collect())
    }

    async fn put(&self, path: &str, body: &Value) -> Result<()> {
        let mut state = self.state();
        state
            .calls
            .push(RemoteCall::Put(path.to_string(), body.clone()));
        Self::check_failure(&state, "PUT", path)?;
        state.resources.insert(path.to_string(), body.clone());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(RemoteCall::Delete(path.to_string()));
        Self::check_failure(&state, "DELETE", path)?;
        let prefix = format!("{}/", path);
        state
            .resources
            .retain(|key, _| key != path && !key.starts_with(&prefix));
        Ok(())
    }
}
