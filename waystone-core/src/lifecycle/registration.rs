//! Registration: the active and waiting workers of one scope
//!
//! Updates follow the install/wait/activate flow. A newly installed worker
//! takes over right away when nothing is active, when it asked to skip
//! waiting, or when no client is connected; otherwise it waits for the
//! `SKIP_WAITING` message or for the last client to leave.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;

use super::clients::{ClientId, ClientRegistry};
use super::tasks::BackgroundTasks;
use super::worker::CacheWorker;
use super::WorkerState;
use crate::cache::CacheStorage;
use crate::config::{EngineConfig, WaystoneConfig};
use crate::http::InterceptedRequest;
use crate::proxy::{Decision, HttpUpstream, Upstream};
use crate::Result;

#[derive(Default)]
struct Slots {
    active: Option<Arc<CacheWorker>>,
    waiting: Option<Arc<CacheWorker>>,
}

/// Snapshot of one worker for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStatus {
    pub version: String,
    pub state: WorkerState,
    pub precache: String,
    pub runtime: String,
}

impl WorkerStatus {
    fn of(worker: &CacheWorker) -> Self {
        let names = worker.namespaces().current_names();
        Self {
            version: worker.version().to_string(),
            state: worker.state(),
            precache: names.precache.clone(),
            runtime: names.runtime.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationStatus {
    pub active: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
    pub clients: usize,
    pub pending_tasks: usize,
}

pub struct Registration {
    storage: Arc<dyn CacheStorage>,
    upstream: Arc<dyn Upstream>,
    clients: ClientRegistry,
    tasks: BackgroundTasks,
    slots: RwLock<Slots>,
    /// Serializes install and activation
    transition: Mutex<()>,
}

impl Registration {
    pub fn new(storage: Arc<dyn CacheStorage>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            storage,
            upstream,
            clients: ClientRegistry::new(),
            tasks: BackgroundTasks::new(),
            slots: RwLock::new(Slots::default()),
            transition: Mutex::new(()),
        }
    }

    /// Storage backend and HTTP upstream from configuration. No worker is
    /// registered yet.
    pub async fn from_config(config: &WaystoneConfig) -> anyhow::Result<Self> {
        let storage = config.open_storage().await?;
        let upstream = HttpUpstream::new(config.server.origin_url()?)?
            .with_max_body_size(config.server.max_body_size);
        Ok(Self::new(storage, Arc::new(upstream)))
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn upstream(&self) -> &Arc<dyn Upstream> {
        &self.upstream
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn active(&self) -> Option<Arc<CacheWorker>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).active.clone()
    }

    pub fn waiting(&self) -> Option<Arc<CacheWorker>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).waiting.clone()
    }

    /// Install a worker for `config` and activate it if allowed.
    ///
    /// Registering the version that is already active or waiting is a no-op.
    /// Returns the state the worker for that version ends up in.
    pub async fn register(&self, config: EngineConfig) -> Result<WorkerState> {
        let _transition = self.transition.lock().await;

        for worker in [self.active(), self.waiting()].into_iter().flatten() {
            if worker.version() == config.version {
                log::debug!("Version {} already registered ({})", config.version, worker.state());
                return Ok(worker.state());
            }
        }

        let worker = Arc::new(CacheWorker::new(
            Arc::new(config),
            self.storage.clone(),
            self.upstream.clone(),
            self.tasks.clone(),
        ));
        worker.install().await?;

        let replaced = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            slots.waiting.replace(worker.clone())
        };
        if let Some(old) = replaced {
            old.discard();
        }

        self.try_activate().await?;
        Ok(worker.state())
    }

    /// Deliver a message to the waiting worker. Returns whether it was
    /// understood.
    pub async fn post_message(&self, message: &str) -> Result<bool> {
        let _transition = self.transition.lock().await;
        let Some(waiting) = self.waiting() else {
            log::debug!("No waiting worker for message {:?}", message);
            return Ok(false);
        };
        if !waiting.handle_message(message) {
            return Ok(false);
        }
        self.try_activate().await?;
        Ok(true)
    }

    /// Register a client; it is controlled by the active version, if any
    pub fn client_connected(&self) -> ClientId {
        let controller = self.active().map(|w| w.version().to_string());
        self.clients.connect(controller)
    }

    /// Remove a client; the last one leaving lets a waiting worker take over
    pub async fn client_disconnected(&self, id: ClientId) -> Result<()> {
        self.clients.disconnect(id);
        if self.clients.is_empty() && self.waiting().is_some() {
            let _transition = self.transition.lock().await;
            self.try_activate().await?;
        }
        Ok(())
    }

    /// Must be called with `transition` held
    async fn try_activate(&self) -> Result<bool> {
        let Some(waiting) = self.waiting() else {
            return Ok(false);
        };

        let has_active = self.active().is_some();
        if has_active && !waiting.skip_waiting_requested() && !self.clients.is_empty() {
            log::info!(
                "Worker {} is waiting for {} clients to close",
                waiting.version(),
                self.clients.len()
            );
            return Ok(false);
        }

        let previous = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            slots.waiting = None;
            slots.active.replace(waiting.clone())
        };
        if let Some(previous) = previous {
            previous.supersede();
        }

        waiting.activate(&self.clients).await?;
        Ok(true)
    }

    /// Serve a request with the active worker; pass through without one
    pub async fn handle(&self, request: &InterceptedRequest) -> Decision {
        match self.active() {
            Some(worker) => worker.handle_fetch(request).await,
            None => Decision::PassThrough,
        }
    }

    pub fn status(&self) -> RegistrationStatus {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        RegistrationStatus {
            active: slots.active.as_deref().map(WorkerStatus::of),
            waiting: slots.waiting.as_deref().map(WorkerStatus::of),
            clients: self.clients.len(),
            pending_tasks: self.tasks.pending(),
        }
    }

    /// Wait for all background work to finish
    pub async fn drain(&self) {
        self.tasks.drain().await;
    }
}
