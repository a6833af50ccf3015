//! Cache configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Shell assets fetched into the precache namespace at install time
pub const DEFAULT_PRECACHE_URLS: &[&str] = &[
    "/css/sc.css",
    "/css/slideshow.css",
    "/js/scripts.js",
    "/js/jq.min.js",
    "/site.webmanifest",
    "/favicon.ico",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Version tag, bumped on every deploy
    /// Env: WS_CACHE_VERSION
    pub version: String,

    /// Paths fetched verbatim into the precache namespace
    pub precache_urls: Vec<String>,

    /// Runtime entry bound for image requests
    pub image_max_entries: usize,

    /// Runtime entry bound for font requests
    pub font_max_entries: usize,

    /// Upstream fetch timeout in seconds, 0 disables it
    /// Env: WS_FETCH_TIMEOUT
    pub fetch_timeout_secs: u64,

    /// Request skip-waiting as soon as installation succeeds
    pub skip_waiting_on_install: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            precache_urls: DEFAULT_PRECACHE_URLS.iter().map(|s| s.to_string()).collect(),
            image_max_entries: 200,
            font_max_entries: 50,
            fetch_timeout_secs: 15,
            skip_waiting_on_install: true,
        }
    }
}

impl CacheConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(version) = env::var("WS_CACHE_VERSION") {
            self.version = version;
        }
        if let Ok(timeout) = env::var("WS_FETCH_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.fetch_timeout_secs = t;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            bail!("Invalid cache version: version tag cannot be empty");
        }
        if self.version.contains(['/', '\\']) {
            bail!("Invalid cache version {:?}: must not contain path separators", self.version);
        }
        if self.image_max_entries == 0 || self.font_max_entries == 0 {
            bail!("Invalid eviction bound: image/font max entries must be at least 1");
        }
        for url in &self.precache_urls {
            if !url.starts_with('/') {
                bail!("Invalid precache URL {:?}: must be an absolute path", url);
            }
        }
        Ok(())
    }
}
