//! Log output destinations and the structured entry written to them

use std::collections::HashMap;

use crate::logging::{LogFormat, LogLevel, LoggingConfig};

/// Where logs should be sent
#[derive(Clone, Debug)]
pub enum LogOutput {
    Stdout {
        /// Override the default format for this output
        format: Option<LogFormat>,
    },
    Stderr {
        /// Override the default format for this output
        format: Option<LogFormat>,
    },
}

/// A structured log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Usually the module path
    pub target: String,
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, target: String) -> Self {
        Self { timestamp: chrono::Utc::now(), level, message, target, fields: HashMap::new() }
    }

    /// Create a LogEntry from a standard log::Record
    pub fn from_log_record(record: &log::Record, config: &LoggingConfig) -> Self {
        let mut entry = Self::new(
            record.level().into(),
            record.args().to_string(),
            record.target().to_string(),
        );

        for (key, value) in &config.context_fields {
            entry.fields.insert(key.clone(), serde_json::Value::String(value.clone()));
        }

        entry
    }

    /// Add a structured field to the log entry
    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_with_fields() {
        let entry = LogEntry::new(LogLevel::Warn, "write failed".to_string(), "cache".to_string())
            .with_field("namespace", serde_json::Value::String("runtime-v1".to_string()));

        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.fields.len(), 1);
    }

    #[test]
    fn test_context_fields_from_config() {
        let config = LoggingConfig::default().with_context_field("version", "v2");
        let entry = LogEntry::from_log_record(
            &log::Record::builder()
                .args(format_args!("activated"))
                .level(log::Level::Info)
                .target("waystone_core::lifecycle")
                .build(),
            &config,
        );
        assert_eq!(entry.message, "activated");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.fields.get("version"), Some(&serde_json::Value::String("v2".to_string())));
    }
}
