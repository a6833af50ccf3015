//! Waystone logging
//!
//! A backend for the standard `log` facade. Configure once at startup, then
//! use `log::info!`, `log::warn!` and friends anywhere.
//!
//! # Example
//!
//! ```rust,no_run
//! use waystone_core::logging::{LoggingConfig, LogLevel};
//!
//! let config = LoggingConfig::production()
//!     .with_level(LogLevel::Debug)
//!     .with_context_field("service", "waystone");
//!
//! waystone_core::logging::init_logging(&config).unwrap();
//! log::info!("Listening on {}", "127.0.0.1:8080");
//! ```

pub mod config;
pub mod destinations;
pub mod formatter;

pub use config::{LogLevel, LoggingConfig};
pub use destinations::{LogEntry, LogOutput};
pub use formatter::LogFormat;

use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install the Waystone logger as the global `log` backend.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = init_logging_internal(config);
    });
    result
}

fn init_logging_internal(config: &LoggingConfig) -> anyhow::Result<()> {
    let logger = WaystoneLogger::new(config.clone());
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(config.level.into());
    Ok(())
}

struct WaystoneLogger {
    config: LoggingConfig,
    writers: Vec<(LogOutput, LogFormat)>,
}

impl WaystoneLogger {
    fn new(config: LoggingConfig) -> Self {
        let mut writers: Vec<(LogOutput, LogFormat)> = config
            .outputs
            .iter()
            .map(|output| {
                let format = match output {
                    LogOutput::Stdout { format } | LogOutput::Stderr { format } => {
                        format.clone().unwrap_or_else(|| config.format.clone())
                    }
                };
                (output.clone(), format)
            })
            .collect();

        if writers.is_empty() {
            writers.push((LogOutput::Stderr { format: None }, config.format.clone()));
        }

        Self { config, writers }
    }
}

impl log::Log for WaystoneLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        LogLevel::from(metadata.level()) <= self.config.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = LogEntry::from_log_record(record, &self.config);

        for (output, format) in &self.writers {
            let line = format.format_entry(&entry);
            let _ = match output {
                LogOutput::Stdout { .. } => writeln!(std::io::stdout().lock(), "{}", line),
                LogOutput::Stderr { .. } => writeln!(std::io::stderr().lock(), "{}", line),
            };
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn test_logger_level_filter() {
        let logger = WaystoneLogger::new(LoggingConfig::default().with_level(LogLevel::Warn));

        let warn = log::Metadata::builder().level(log::Level::Warn).build();
        let debug = log::Metadata::builder().level(log::Level::Debug).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&debug));
    }

    #[test]
    fn test_output_format_override() {
        let mut config = LoggingConfig::default().with_format(LogFormat::Logfmt);
        config.outputs = vec![
            LogOutput::Stdout { format: Some(LogFormat::Json) },
            LogOutput::Stderr { format: None },
        ];

        let logger = WaystoneLogger::new(config);
        assert_eq!(logger.writers[0].1, LogFormat::Json);
        assert_eq!(logger.writers[1].1, LogFormat::Logfmt);
    }
}
