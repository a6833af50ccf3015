//! In-memory cache storage
//!
//! Entries live in a `HashMap` of namespaces behind an async `RwLock` and are
//! lost when the process exits. Used in tests and for throwaway sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::entries::EntryTable;
use super::traits::CacheStorage;
use crate::http::{RequestKey, StoredResponse};
use crate::Result;

/// In-memory cache storage
///
/// # Example
///
/// ```
/// use waystone_core::cache::MemoryCacheStorage;
///
/// let storage = MemoryCacheStorage::new();
/// ```
#[derive(Clone, Default)]
pub struct MemoryCacheStorage {
    namespaces: Arc<RwLock<HashMap<String, EntryTable>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, namespace: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces.entry(namespace.to_string()).or_default();
        Ok(())
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().await;
        let mut names: Vec<String> = namespaces.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        let mut namespaces = self.namespaces.write().await;
        Ok(namespaces.remove(namespace).is_some())
    }

    async fn get(&self, namespace: &str, key: &RequestKey) -> Result<Option<StoredResponse>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).and_then(|table| table.get(key)).cloned())
    }

    async fn put(&self, namespace: &str, key: RequestKey, response: StoredResponse) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces.entry(namespace.to_string()).or_default().insert(key, response);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &RequestKey) -> Result<bool> {
        let mut namespaces = self.namespaces.write().await;
        Ok(namespaces.get_mut(namespace).map(|table| table.remove(key)).unwrap_or(false))
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<RequestKey>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).map(|table| table.keys()).unwrap_or_default())
    }

    async fn len(&self, namespace: &str) -> Result<usize> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).map(|table| table.len()).unwrap_or(0))
    }
}
