//! Versioned namespace management

use std::sync::Arc;

use super::store::BoundedCacheStore;
use super::traits::CacheStorage;
use crate::Result;

/// The two namespace names that are current for a version tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub precache: String,
    pub runtime: String,
}

impl CacheNames {
    pub fn for_version(version: &str) -> Self {
        Self { precache: format!("precache-{}", version), runtime: format!("runtime-{}", version) }
    }

    pub fn contains(&self, name: &str) -> bool {
        name == self.precache || name == self.runtime
    }
}

/// Opens namespaces and garbage-collects the ones from other versions
#[derive(Clone)]
pub struct NamespaceManager {
    storage: Arc<dyn CacheStorage>,
    names: CacheNames,
}

impl NamespaceManager {
    pub fn new(storage: Arc<dyn CacheStorage>, names: CacheNames) -> Self {
        Self { storage, names }
    }

    /// Create (if needed) and return a handle on a namespace
    pub async fn open(&self, name: &str) -> Result<BoundedCacheStore> {
        self.storage.open(name).await?;
        Ok(BoundedCacheStore::new(self.storage.clone(), name))
    }

    /// Handle on the runtime namespace without creating it; the first write does.
    pub fn runtime(&self) -> BoundedCacheStore {
        BoundedCacheStore::new(self.storage.clone(), self.names.runtime.clone())
    }

    pub fn current_names(&self) -> &CacheNames {
        &self.names
    }

    /// Delete every namespace that is not one of the current two.
    ///
    /// Returns the deleted names. Running it again without a version bump
    /// deletes nothing.
    pub async fn purge_stale(&self) -> Result<Vec<String>> {
        let mut purged = Vec::new();
        for name in self.storage.namespaces().await? {
            if self.names.contains(&name) {
                continue;
            }
            if self.storage.delete_namespace(&name).await? {
                log::info!("Purged stale cache namespace {}", name);
                purged.push(name);
            }
        }
        Ok(purged)
    }

    pub async fn existing(&self) -> Result<Vec<String>> {
        self.storage.namespaces().await
    }
}
