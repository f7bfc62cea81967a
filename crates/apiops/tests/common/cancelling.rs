//! A remote that cancels the run while a matching PUT is in flight.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use apiops::remote::Result;
use apiops::{CancelHandle, InMemoryService, RemoteService};

pub struct CancelOnPut {
    inner: Arc<InMemoryService>,
    prefix: String,
    handle: CancelHandle,
}

impl CancelOnPut {
    /// Trips `handle` on every PUT whose path starts with `prefix`.
    pub fn new(inner: Arc<InMemoryService>, prefix: impl Into<String>, handle: CancelHandle) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
            handle,
        }
    }
}

#[async_trait]
impl RemoteService for CancelOnPut {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.inner.get(path).await
    }

    async fn list(&self, path: &str) -> Result<Vec<Value>> {
        self.inner.list(path).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<()> {
        let result = self.inner.put(path, body).await;
        if path.starts_with(&self.prefix) {
            self.handle.cancel();
            // Give the engine a chance to observe the signal mid-call.
            tokio::task::yield_now().await;
        }
        result
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path).await
    }
}
