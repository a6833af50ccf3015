//! Storage configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `memory` or `file`
    /// Env: WS_STORAGE_BACKEND
    pub backend: String,
    /// Directory for the file backend
    /// Env: WS_DATA_DIR
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: "file".to_string(), data_dir: "./data/cache".to_string() }
    }
}

impl StorageConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }
    pub fn apply_env_vars(&mut self) {
        if let Ok(backend) = env::var("WS_STORAGE_BACKEND") {
            self.backend = backend;
        }
        if let Ok(dir) = env::var("WS_DATA_DIR") {
            self.data_dir = dir;
        }
    }
    pub fn validate(&self) -> Result<()> {
        match self.backend.as_str() {
            "memory" => Ok(()),
            "file" if self.data_dir.is_empty() => bail!("Invalid data_dir: cannot be empty"),
            "file" => Ok(()),
            other => bail!("Unknown storage backend {:?} (expected memory or file)", other),
        }
    }
}
