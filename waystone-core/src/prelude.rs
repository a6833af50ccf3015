//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use waystone_core::prelude::*;
//! ```

// === Configuration ===
pub use crate::config::{CacheConfig, EngineConfig, WaystoneConfig};
pub use crate::logging::LoggingConfig;

// === Storage ===
pub use crate::cache::{
    BoundedCacheStore, CacheNames, CacheStorage, FileCacheStorage, MemoryCacheStorage,
    NamespaceManager,
};

// === Request/response model ===
pub use crate::http::{
    CacheMode, Destination, InterceptServer, InterceptedRequest, RequestKey, RequestMode,
    ResponseType, StoredResponse,
};

// === Engine ===
pub use crate::lifecycle::{
    BackgroundTasks, CacheWorker, ClientRegistry, Registration, RegistrationStatus, WorkerState,
    SKIP_WAITING,
};
pub use crate::proxy::{
    Decision, FetchError, FetchOptions, HttpUpstream, Route, Router, Strategy, StrategySet, Upstream,
};

// === Errors ===
pub use crate::{Error, Result};
