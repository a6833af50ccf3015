//! Logger configuration

use std::collections::HashMap;
use std::str::FromStr;

use crate::logging::{LogFormat, LogOutput};

/// Runtime logger configuration
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Minimum log level to capture
    pub level: LogLevel,
    /// Where logs are written
    pub outputs: Vec<LogOutput>,
    /// Default format for all outputs (can be overridden per output)
    pub format: LogFormat,
    /// Context fields added to every log entry
    pub context_fields: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            outputs: vec![LogOutput::Stderr { format: None }],
            format: LogFormat::Human,
            context_fields: HashMap::new(),
        }
    }
}

/// Log levels in order of severity (compatible with standard log crate)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown level {:?}", other)),
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warn,
            log::Level::Info => LogLevel::Info,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Trace => LogLevel::Trace,
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl LoggingConfig {
    /// JSON lines on stdout, for log shippers
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            outputs: vec![LogOutput::Stdout { format: Some(LogFormat::Json) }],
            format: LogFormat::Json,
            context_fields: HashMap::new(),
        }
    }

    /// Human-readable debug output on stderr
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            outputs: vec![LogOutput::Stderr { format: Some(LogFormat::Human) }],
            format: LogFormat::Human,
            context_fields: HashMap::new(),
        }
    }

    /// Add a context field that appears in every log entry
    pub fn with_context_field(mut self, key: &str, value: &str) -> Self {
        self.context_fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the default format; outputs without an override follow it
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_stdout(mut self, format: LogFormat) -> Self {
        self.outputs.push(LogOutput::Stdout { format: Some(format) });
        self
    }
}
