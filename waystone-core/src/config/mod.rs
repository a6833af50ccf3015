//! Configuration system for Waystone
//!
//! # Configuration Hierarchy
//!
//! Configuration values are resolved in the following order (highest priority wins):
//!
//! 1. **Environment Variables** (`WS_*`)
//! 2. **Config File** (waystone.toml)
//! 3. **Defaults**
//!
//! # Example
//!
//! ```no_run
//! use waystone_core::config::WaystoneConfig;
//!
//! let config = WaystoneConfig::load()?;
//! let engine = config.engine_config()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cache;
pub mod engine;
pub mod logging;
pub mod server;
pub mod storage;

pub use cache::CacheConfig;
pub use engine::EngineConfig;
pub use logging::LoggingConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStorage, FileCacheStorage, MemoryCacheStorage};

/// Complete Waystone configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WaystoneConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl WaystoneConfig {
    /// Load configuration with full supersedence chain from `waystone.toml`
    pub fn load() -> Result<Self> {
        Self::load_from("waystone.toml")
    }

    /// Load configuration from a specific file, if it exists
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
        }

        config.apply_env_vars();

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.server.merge(other.server);
        self.cache.merge(other.cache);
        self.storage.merge(other.storage);
        self.logging.merge(other.logging);
    }

    /// Apply environment variables to configuration
    pub fn apply_env_vars(&mut self) {
        self.server.apply_env_vars();
        self.cache.apply_env_vars();
        self.storage.apply_env_vars();
        self.logging.apply_env_vars();
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.cache.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Build the immutable engine configuration for the configured version
    pub fn engine_config(&self) -> Result<EngineConfig> {
        self.validate()?;
        let timeout = match self.cache.fetch_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Ok(EngineConfig::new(self.cache.version.clone(), self.server.origin_url()?)
            .with_precache_urls(self.cache.precache_urls.clone())
            .with_bounds(self.cache.image_max_entries, self.cache.font_max_entries)
            .with_fetch_timeout(timeout)
            .with_skip_waiting_on_install(self.cache.skip_waiting_on_install))
    }

    /// Open the configured storage backend
    pub async fn open_storage(&self) -> Result<Arc<dyn CacheStorage>> {
        self.storage.validate()?;
        let storage: Arc<dyn CacheStorage> = match self.storage.backend.as_str() {
            "memory" => Arc::new(MemoryCacheStorage::new()),
            _ => Arc::new(
                FileCacheStorage::open_dir(&self.storage.data_dir)
                    .await
                    .with_context(|| format!("Failed to open cache dir {}", self.storage.data_dir))?,
            ),
        };
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WaystoneConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.cache.version, "v1");
        assert_eq!(config.storage.backend, "file");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waystone.toml");
        std::fs::write(
            &path,
            r#"
[server]
origin = "https://catalog.example.com"

[cache]
version = "v13.1"
image_max_entries = 100
"#,
        )
        .unwrap();

        let config = WaystoneConfig::from_file(&path).unwrap();
        assert_eq!(config.cache.version, "v13.1");
        assert_eq!(config.cache.image_max_entries, 100);
        assert_eq!(config.cache.font_max_entries, 50);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_engine_config() {
        let mut config = WaystoneConfig::default();
        config.cache.version = "v2".to_string();
        config.cache.fetch_timeout_secs = 0;

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.cache_names().runtime, "runtime-v2");
        assert_eq!(engine.fetch_timeout, None);
        assert_eq!(engine.origin.as_str(), "http://127.0.0.1:8000/");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = WaystoneConfig::load_from("/nonexistent/waystone.toml").unwrap();
        assert_eq!(config.cache.image_max_entries, 200);
    }

    #[tokio::test]
    async fn test_open_memory_storage() {
        let mut config = WaystoneConfig::default();
        config.storage.backend = "memory".to_string();
        let storage = config.open_storage().await.unwrap();
        assert!(storage.namespaces().await.unwrap().is_empty());
    }
}
