//! Immutable engine configuration
//!
//! Built once from [`WaystoneConfig`](super::WaystoneConfig) and shared by
//! every component of one worker version. Nothing in the engine reads
//! process-wide state.

use std::time::Duration;

use url::Url;

use crate::cache::CacheNames;
use crate::http::Destination;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Version tag this worker serves
    pub version: String,
    /// Own origin; other origins are never intercepted
    pub origin: Url,
    /// Precache manifest, as paths relative to `origin`
    pub precache_urls: Vec<String>,
    pub image_max_entries: usize,
    pub font_max_entries: usize,
    /// `None` waits on upstream indefinitely
    pub fetch_timeout: Option<Duration>,
    pub skip_waiting_on_install: bool,
}

impl EngineConfig {
    /// Defaults for a version and origin
    pub fn new(version: impl Into<String>, origin: Url) -> Self {
        let defaults = super::CacheConfig::default();
        Self {
            version: version.into(),
            origin,
            precache_urls: defaults.precache_urls,
            image_max_entries: defaults.image_max_entries,
            font_max_entries: defaults.font_max_entries,
            fetch_timeout: Some(Duration::from_secs(defaults.fetch_timeout_secs)),
            skip_waiting_on_install: defaults.skip_waiting_on_install,
        }
    }

    pub fn with_precache_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_bounds(mut self, image_max_entries: usize, font_max_entries: usize) -> Self {
        self.image_max_entries = image_max_entries;
        self.font_max_entries = font_max_entries;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_skip_waiting_on_install(mut self, enabled: bool) -> Self {
        self.skip_waiting_on_install = enabled;
        self
    }

    pub fn cache_names(&self) -> CacheNames {
        CacheNames::for_version(&self.version)
    }

    /// Eviction bound for a destination class; only images and fonts have one
    pub fn bound_for(&self, destination: Destination) -> Option<usize> {
        match destination {
            Destination::Image => Some(self.image_max_entries),
            Destination::Font => Some(self.font_max_entries),
            _ => None,
        }
    }

    /// Resolve a manifest path against the origin
    pub fn resolve(&self, path: &str) -> Option<Url> {
        self.origin.join(path).ok()
    }
}
