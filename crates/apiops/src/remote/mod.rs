//! Access to the live API Management service.

pub mod error;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

pub use error::{RemoteError, Result};
pub use http::HttpRemote;
pub use memory::{InMemoryService, RemoteCall};

/// Operations the publisher needs from the remote service.
///
/// Paths are relative to the service URI, e.g. `apis/orders` or
/// `products/starter/apis`.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Fetches a resource. `None` when it does not exist.
    async fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Lists every item of a collection, following pagination.
    async fn list(&self, path: &str) -> Result<Vec<Value>>;

    /// Creates or replaces a resource.
    async fn put(&self, path: &str, body: &Value) -> Result<()>;

    /// Deletes a resource. Deleting an absent resource succeeds.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Extracts the `name` of each listed item.
pub fn item_names(items: &[Value]) -> impl Iterator<Item = &str> {
    items
        .iter()
        .filter_map(|item| item.get("name").and_then(Value::as_str))
}
