//! Core traits for cache storage

use crate::http::{RequestKey, StoredResponse};
use crate::Result;

/// Named persistent key/value caches (request key -> response).
///
/// Every method is atomic with respect to the others. Entries in a namespace
/// are kept in insertion order, and `put` of an existing key moves it to the
/// back. Writing to a namespace that does not exist yet creates it.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if it does not exist
    async fn open(&self, namespace: &str) -> Result<()>;

    /// Names of every existing namespace
    async fn namespaces(&self) -> Result<Vec<String>>;

    /// Delete a namespace and all its entries; `false` if it did not exist
    async fn delete_namespace(&self, namespace: &str) -> Result<bool>;

    async fn get(&self, namespace: &str, key: &RequestKey) -> Result<Option<StoredResponse>>;

    async fn put(&self, namespace: &str, key: RequestKey, response: StoredResponse) -> Result<()>;

    /// Remove one entry; `false` if it was not present
    async fn delete(&self, namespace: &str, key: &RequestKey) -> Result<bool>;

    /// Keys of a namespace, oldest-inserted first
    async fn keys(&self, namespace: &str) -> Result<Vec<RequestKey>>;

    /// Number of entries in a namespace
    async fn len(&self, namespace: &str) -> Result<usize> {
        Ok(self.keys(namespace).await?.len())
    }
}
