//! Bounded cache store
//!
//! A [`BoundedCacheStore`] is a handle on one namespace of a [`CacheStorage`]
//! with an eviction routine that caps the entry count. Storage failures never
//! reach the caller: reads degrade to a miss and writes are logged and
//! dropped, so serving a response is never held up by a broken store.
//!
//! A store is retired when its version is superseded. Writes through a
//! retired store are dropped so late background work cannot recreate a
//! purged namespace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::traits::CacheStorage;
use crate::http::{RequestKey, StoredResponse};

/// Handle on a single cache namespace
#[derive(Clone)]
pub struct BoundedCacheStore {
    storage: Arc<dyn CacheStorage>,
    namespace: String,
    retired: Arc<AtomicBool>,
}

impl std::fmt::Debug for BoundedCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCacheStore").field("namespace", &self.namespace).finish()
    }
}

impl BoundedCacheStore {
    pub fn new(storage: Arc<dyn CacheStorage>, namespace: impl Into<String>) -> Self {
        Self { storage, namespace: namespace.into(), retired: Arc::new(AtomicBool::new(false)) }
    }

    /// Refuse all further writes through this handle and its clones
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Look up an entry; storage errors count as a miss
    pub async fn get(&self, key: &RequestKey) -> Option<StoredResponse> {
        match self.storage.get(&self.namespace, key).await {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Cache read failed in {} for {}: {}", self.namespace, key, e);
                None
            }
        }
    }

    /// Store (overwriting) an entry without its cookie headers. Returns
    /// whether the write landed.
    pub async fn put(&self, key: RequestKey, response: StoredResponse) -> bool {
        if self.is_retired() {
            log::debug!("Dropping write to retired {} for {}", self.namespace, key);
            return false;
        }
        match self.storage.put(&self.namespace, key.clone(), response.for_storage()).await {
            Ok(()) if self.is_retired() => {
                // Retired mid-write: the purge may already have run.
                if let Err(e) = self.storage.delete_namespace(&self.namespace).await {
                    log::warn!("Could not drop retired {}: {}", self.namespace, e);
                }
                false
            }
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cache write failed in {} for {}: {}", self.namespace, key, e);
                false
            }
        }
    }

    /// Delete oldest-inserted entries until at most `max_entries` remain.
    ///
    /// Returns the number of entries removed.
    pub async fn evict_excess(&self, max_entries: usize) -> usize {
        if self.is_retired() {
            return 0;
        }
        let keys = match self.storage.keys(&self.namespace).await {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Cache eviction could not list {}: {}", self.namespace, e);
                return 0;
            }
        };

        let excess = keys.len().saturating_sub(max_entries);
        let mut evicted = 0;
        for key in keys.iter().take(excess) {
            match self.storage.delete(&self.namespace, key).await {
                Ok(true) => evicted += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Cache eviction failed in {} for {}: {}", self.namespace, key, e),
            }
        }

        if evicted > 0 {
            log::debug!("Evicted {} entries from {} (bound {})", evicted, self.namespace, max_entries);
        }
        evicted
    }

    pub async fn keys(&self) -> Vec<RequestKey> {
        self.storage.keys(&self.namespace).await.unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.storage.len(&self.namespace).await.unwrap_or(0)
    }
}
