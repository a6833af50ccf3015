//! Server configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Interception front-end configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening address
    /// Env: WS_HOST
    /// Default: "127.0.0.1"
    pub host: String,

    /// Listening port
    /// Env: WS_PORT
    /// Default: 8080
    pub port: u16,

    /// The engine's own origin; requests to any other origin pass through
    /// Env: WS_ORIGIN
    /// Default: "http://127.0.0.1:8000"
    pub origin: String,

    /// Maximum request and upstream response body size in bytes
    /// Env: WS_MAX_BODY_SIZE
    /// Default: 10485760 (10MB)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            origin: "http://127.0.0.1:8000".to_string(),
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl ServerConfig {
    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.host = other.host;
        self.port = other.port;
        self.origin = other.origin;
        self.max_body_size = other.max_body_size;
    }

    /// Apply environment variables
    pub fn apply_env_vars(&mut self) {
        if let Ok(host) = env::var("WS_HOST") {
            self.host = host;
        }

        if let Ok(port) = env::var("WS_PORT") {
            if let Ok(p) = port.parse() {
                self.port = p;
            }
        }

        if let Ok(origin) = env::var("WS_ORIGIN") {
            self.origin = origin;
        }

        if let Ok(size) = env::var("WS_MAX_BODY_SIZE") {
            if let Ok(s) = size.parse() {
                self.max_body_size = s;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("Invalid port: port must be between 1 and 65535");
        }

        if self.host.is_empty() {
            bail!("Invalid host: host cannot be empty");
        }

        if self.max_body_size == 0 {
            bail!("Invalid max_body_size: must be greater than 0");
        }

        self.origin_url()?;
        Ok(())
    }

    /// Parsed origin URL
    pub fn origin_url(&self) -> Result<Url> {
        let url = match Url::parse(&self.origin) {
            Ok(url) => url,
            Err(e) => bail!("Invalid origin {:?}: {}", self.origin, e),
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            bail!("Invalid origin {:?}: must be an http(s) URL with a host", self.origin);
        }
        Ok(url)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
