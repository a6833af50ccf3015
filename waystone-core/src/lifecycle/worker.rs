//! A versioned cache worker

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::try_join_all;

use super::clients::ClientRegistry;
use super::tasks::BackgroundTasks;
use super::{WorkerState, SKIP_WAITING};
use crate::cache::{CacheStorage, NamespaceManager};
use crate::config::EngineConfig;
use crate::http::{Destination, InterceptedRequest, RequestKey, StoredResponse};
use crate::proxy::strategy::fetch_with_timeout;
use crate::proxy::{Decision, FetchOptions, Router, StrategySet, Upstream};
use crate::{Error, Result};

/// One version of the caching engine: its namespaces, router and state
pub struct CacheWorker {
    config: Arc<EngineConfig>,
    namespaces: NamespaceManager,
    router: Router,
    upstream: Arc<dyn Upstream>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl CacheWorker {
    /// New worker in the `Installing` state
    pub fn new(
        config: Arc<EngineConfig>,
        storage: Arc<dyn CacheStorage>,
        upstream: Arc<dyn Upstream>,
        tasks: BackgroundTasks,
    ) -> Self {
        let namespaces = NamespaceManager::new(storage, config.cache_names());
        let strategies =
            StrategySet::new(config.clone(), namespaces.runtime(), upstream.clone(), tasks);
        let router = Router::new(config.clone(), strategies);

        Self {
            config,
            namespaces,
            router,
            upstream,
            state: RwLock::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        &self.namespaces
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            log::info!("Worker {}: {} -> {}", self.config.version, *state, next);
            *state = next;
        }
    }

    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Handle a message posted to the worker. Only [`SKIP_WAITING`] does
    /// anything; returns whether the message was understood.
    pub fn handle_message(&self, message: &str) -> bool {
        if message == SKIP_WAITING {
            log::debug!("Worker {}: skip-waiting requested", self.config.version);
            self.skip_waiting();
            true
        } else {
            log::debug!("Worker {}: ignoring message {:?}", self.config.version, message);
            false
        }
    }

    /// Populate the precache namespace from the manifest.
    ///
    /// All assets are fetched concurrently and each must answer with an ok
    /// status. Any failure leaves the worker `Redundant`.
    pub async fn install(&self) -> Result<()> {
        if self.state() != WorkerState::Installing {
            return Err(Error::Install(format!(
                "worker {} is {}, not installing",
                self.config.version,
                self.state()
            )));
        }

        match self.populate_precache().await {
            Ok(count) => {
                log::info!("Worker {}: precached {} assets", self.config.version, count);
                self.set_state(WorkerState::Waiting);
                if self.config.skip_waiting_on_install {
                    self.skip_waiting();
                }
                Ok(())
            }
            Err(e) => {
                log::warn!("Worker {}: install failed: {}", self.config.version, e);
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    async fn populate_precache(&self) -> Result<usize> {
        let precache = self.namespaces.open(&self.namespaces.current_names().precache).await?;

        let requests = self
            .config
            .precache_urls
            .iter()
            .map(|path| {
                self.config
                    .resolve(path)
                    .map(|url| InterceptedRequest::get(url, Destination::Other))
                    .ok_or_else(|| Error::Install(format!("invalid precache path {:?}", path)))
            })
            .collect::<Result<Vec<_>>>()?;

        let fetched: Vec<(RequestKey, StoredResponse)> =
            try_join_all(requests.iter().map(|request| async move {
                let response = fetch_with_timeout(
                    self.upstream.as_ref(),
                    request,
                    FetchOptions::default(),
                    self.config.fetch_timeout,
                )
                .await
                .map_err(|e| Error::Install(format!("{}: {}", request.url, e)))?;

                if !response.is_ok() {
                    return Err(Error::Install(format!(
                        "{} answered {}",
                        request.url, response.status
                    )));
                }
                Ok((request.key(), response))
            }))
            .await?;

        let count = fetched.len();
        for (key, response) in fetched {
            if !precache.put(key.clone(), response).await {
                return Err(Error::Install(format!("could not store {}", key)));
            }
        }
        Ok(count)
    }

    /// Take over: purge stale namespaces and claim every client.
    ///
    /// Safe to repeat; a second activation purges nothing and claims nobody
    /// new. Returns the number of clients claimed.
    pub async fn activate(&self, clients: &ClientRegistry) -> Result<usize> {
        match self.state() {
            WorkerState::Waiting | WorkerState::Activating | WorkerState::Active => {}
            other => {
                return Err(Error::Install(format!(
                    "worker {} cannot activate from {}",
                    self.config.version, other
                )))
            }
        }

        self.set_state(WorkerState::Activating);
        if let Err(e) = self.namespaces.purge_stale().await {
            log::warn!("Worker {}: purging stale caches failed: {}", self.config.version, e);
        }
        let claimed = clients.claim(&self.config.version);
        self.set_state(WorkerState::Active);

        if claimed > 0 {
            log::info!("Worker {}: claimed {} clients", self.config.version, claimed);
        }
        Ok(claimed)
    }

    /// Replaced by a newer version. In-flight requests may still finish
    /// but their runtime writes are dropped.
    pub(crate) fn supersede(&self) {
        self.router.strategies().runtime().retire();
        self.set_state(WorkerState::Superseded);
    }

    pub(crate) fn discard(&self) {
        self.router.strategies().runtime().retire();
        self.set_state(WorkerState::Redundant);
    }

    /// Route and serve an intercepted request
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> Decision {
        self.router.handle(request).await
    }
}
