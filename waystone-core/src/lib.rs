//! Waystone - Core
//!
//! A client-resident caching proxy. Waystone intercepts outgoing HTTP requests
//! from a web client and decides, per request class, whether to serve from a
//! local store, fetch fresh, or do both and reconcile.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waystone_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WaystoneConfig::load()?;
//!     let registration = Arc::new(Registration::from_config(&config).await?);
//!     registration.register(config.engine_config()?).await?;
//!
//!     let origin = config.server.origin_url()?;
//!     InterceptServer::new(registration, config.server.listen_addr(), origin)
//!         .serve()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`cache`] - Storage backends, bounded store and namespace management
//! - [`proxy`] - Response validation, serving strategies and the router
//! - [`lifecycle`] - Install/activate state machine, clients, background tasks
//! - [`http`] - Intercepted request/response model and the hyper front-end
//! - [`config`] - Layered TOML/env configuration
//! - [`logging`] - `log` facade backend with human/JSON/logfmt output

pub mod cache;
pub mod config; // Configuration system with TOML support
pub mod http;
pub mod lifecycle;
pub mod logging; // Declarative logging system with standard log crate integration
pub mod proxy;

/// In-memory fakes for driving the engine without a network
pub mod testing;

// Prelude module for convenient imports
pub mod prelude;

pub use cache::{BoundedCacheStore, CacheStorage, FileCacheStorage, MemoryCacheStorage};
pub use config::{CacheConfig, WaystoneConfig};
pub use http::{InterceptServer, InterceptedRequest, StoredResponse};
pub use lifecycle::{CacheWorker, Registration, WorkerState};
pub use proxy::{Router, Upstream};

// Main result type for the engine
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Waystone
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Cache storage backend failures (quota, corruption, missing namespace)
    #[error("Storage error: {0}")]
    Storage(String),
    /// A precache asset could not be fetched; installation failed
    #[error("Install failed: {0}")]
    Install(String),
    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
    /// Front-end HTTP errors (bind, conversion)
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
