//! Serving strategies
//!
//! Each strategy turns an intercepted request into a response and never
//! fails: network errors fall back to the runtime cache or to a synthesized
//! response. Cache writes, revalidation and eviction are spawned on the
//! background registry and never delay the returned response.

use std::sync::Arc;
use std::time::Duration;

use super::traits::{FetchError, FetchOptions, Upstream};
use super::validator::is_admissible;
use crate::cache::BoundedCacheStore;
use crate::config::EngineConfig;
use crate::http::{InterceptedRequest, RequestKey, StoredResponse};
use crate::lifecycle::BackgroundTasks;

/// How a request class is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Fresh fetch, runtime cache only when the network fails
    NetworkFirst,
    /// Cached copy now, refresh in the background
    StaleWhileRevalidate { strict: bool },
    /// Cached copy when present, eviction-bounded runtime entries
    CacheFirst { max_entries: usize },
}

/// The strategies of one worker version, sharing its runtime namespace
#[derive(Clone)]
pub struct StrategySet {
    config: Arc<EngineConfig>,
    runtime: BoundedCacheStore,
    upstream: Arc<dyn Upstream>,
    tasks: BackgroundTasks,
}

impl StrategySet {
    pub fn new(
        config: Arc<EngineConfig>,
        runtime: BoundedCacheStore,
        upstream: Arc<dyn Upstream>,
        tasks: BackgroundTasks,
    ) -> Self {
        Self { config, runtime, upstream, tasks }
    }

    pub fn runtime(&self) -> &BoundedCacheStore {
        &self.runtime
    }

    pub async fn serve(&self, strategy: Strategy, request: &InterceptedRequest) -> StoredResponse {
        match strategy {
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::StaleWhileRevalidate { strict } => {
                self.stale_while_revalidate(request, strict).await
            }
            Strategy::CacheFirst { max_entries } => self.cache_first(request, max_entries).await,
        }
    }

    /// Documents: always try the network first so markup tracks the latest deploy.
    pub async fn network_first(&self, request: &InterceptedRequest) -> StoredResponse {
        let key = request.key();

        match self.fetch(request, FetchOptions::no_store()).await {
            Ok(response) => {
                if is_admissible(Some(&response), request.destination, false) {
                    self.store(key, response.clone(), None);
                }
                response
            }
            Err(e) => {
                log::debug!("Network-first fetch failed for {}: {}", key, e);
                match self.runtime.get(&key).await {
                    Some(cached) => cached,
                    None => StoredResponse::offline_document(),
                }
            }
        }
    }

    /// Styles, scripts and unclassified requests: answer from cache
    /// immediately, revalidate concurrently.
    pub async fn stale_while_revalidate(
        &self,
        request: &InterceptedRequest,
        strict: bool,
    ) -> StoredResponse {
        let key = request.key();
        let cached = self.runtime.get(&key).await;

        let update = {
            let this = self.clone();
            let request = request.clone();
            let key = key.clone();
            self.tasks.spawn(async move {
                match this.fetch(&request, FetchOptions::default()).await {
                    Ok(response) => {
                        if is_admissible(Some(&response), request.destination, strict) {
                            this.store(key, response.clone(), None);
                        } else {
                            log::debug!("Not caching {} (status {})", key, response.status);
                        }
                        Some(response)
                    }
                    Err(e) => {
                        log::debug!("Revalidation failed for {}: {}", key, e);
                        None
                    }
                }
            })
        };

        if let Some(cached) = cached {
            log::debug!("Serving {} from cache, revalidating", key);
            return cached;
        }

        update.join().await.flatten().unwrap_or_else(StoredResponse::offline_fallback)
    }

    /// Images and fonts: cache hit wins, refreshed in the background; the
    /// runtime namespace is trimmed to `max_entries` after every write.
    pub async fn cache_first(&self, request: &InterceptedRequest, max_entries: usize) -> StoredResponse {
        let key = request.key();

        if let Some(cached) = self.runtime.get(&key).await {
            let this = self.clone();
            let request = request.clone();
            self.tasks.spawn(async move {
                match this.fetch(&request, FetchOptions::default()).await {
                    Ok(response) if is_admissible(Some(&response), request.destination, false) => {
                        if this.runtime.put(key, response).await {
                            this.runtime.evict_excess(max_entries).await;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => log::debug!("Background refresh failed for {}: {}", key, e),
                }
            });
            return cached;
        }

        match self.fetch(request, FetchOptions::default()).await {
            Ok(response) => {
                if is_admissible(Some(&response), request.destination, false) {
                    self.store(key, response.clone(), Some(max_entries));
                }
                response
            }
            Err(e) => {
                log::debug!("Cache-first fetch failed for {}: {}", key, e);
                StoredResponse::offline_fallback()
            }
        }
    }

    /// Write (and optionally trim) on the background registry
    fn store(&self, key: RequestKey, response: StoredResponse, max_entries: Option<usize>) {
        let runtime = self.runtime.clone();
        self.tasks.spawn(async move {
            if runtime.put(key, response).await {
                if let Some(bound) = max_entries {
                    runtime.evict_excess(bound).await;
                }
            }
        });
    }

    async fn fetch(
        &self,
        request: &InterceptedRequest,
        options: FetchOptions,
    ) -> Result<StoredResponse, FetchError> {
        fetch_with_timeout(self.upstream.as_ref(), request, options, self.config.fetch_timeout).await
    }
}

/// Fetch with an optional deadline; expiry is a [`FetchError::Timeout`]
pub(crate) async fn fetch_with_timeout(
    upstream: &dyn Upstream,
    request: &InterceptedRequest,
    options: FetchOptions,
    timeout: Option<Duration>,
) -> Result<StoredResponse, FetchError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, upstream.fetch(request, options))
            .await
            .map_err(|_| FetchError::Timeout(limit))?,
        None => upstream.fetch(request, options).await,
    }
}
