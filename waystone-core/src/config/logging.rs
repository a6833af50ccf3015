//! Logging configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::logging::{LogFormat, LogLevel};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Env: WS_LOG_LEVEL
    pub level: String,
    /// `human`, `json` or `logfmt`
    /// Env: WS_LOG_FORMAT
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "human".to_string() }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }
    pub fn apply_env_vars(&mut self) {
        if let Ok(level) = env::var("WS_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("WS_LOG_FORMAT") {
            self.format = format;
        }
    }
    pub fn validate(&self) -> Result<()> {
        self.to_logging().map(|_| ())
    }

    /// Build the runtime logger configuration
    pub fn to_logging(&self) -> Result<crate::logging::LoggingConfig> {
        let level: LogLevel = match self.level.parse() {
            Ok(level) => level,
            Err(e) => bail!("Invalid log level: {}", e),
        };
        let format: LogFormat = match self.format.parse() {
            Ok(format) => format,
            Err(e) => bail!("Invalid log format: {}", e),
        };
        Ok(crate::logging::LoggingConfig::default().with_level(level).with_format(format))
    }
}
