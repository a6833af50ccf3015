//! Log formatting options for different output styles

use std::str::FromStr;

use crate::logging::destinations::LogEntry;

/// How logs should be formatted
#[derive(Clone, Debug, PartialEq)]
pub enum LogFormat {
    /// Structured JSON format
    /// Example: {"timestamp":"2024-01-15T10:30:00Z","level":"INFO","message":"Activated v2"}
    Json,

    /// Human-readable format
    /// Example: 2024-01-15 10:30:00.000 INFO  [waystone_core::lifecycle] Activated v2
    Human,

    /// Logfmt format (key=value pairs)
    /// Example: timestamp=2024-01-15T10:30:00Z level=INFO target=waystone_core message="Activated v2"
    Logfmt,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "human" | "text" => Ok(LogFormat::Human),
            "logfmt" => Ok(LogFormat::Logfmt),
            other => Err(format!("unknown format {:?}", other)),
        }
    }
}

impl LogFormat {
    /// Format a log entry according to this format
    pub fn format_entry(&self, entry: &LogEntry) -> String {
        match self {
            LogFormat::Json => format_json(entry),
            LogFormat::Human => format_human(entry),
            LogFormat::Logfmt => format_logfmt(entry),
        }
    }
}

fn level_str(entry: &LogEntry) -> String {
    format!("{:?}", entry.level).to_uppercase()
}

fn field_str(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_json(entry: &LogEntry) -> String {
    let mut json = serde_json::Map::new();

    json.insert("timestamp".to_string(), serde_json::Value::String(entry.timestamp.to_rfc3339()));
    json.insert("level".to_string(), serde_json::Value::String(level_str(entry)));
    json.insert("message".to_string(), serde_json::Value::String(entry.message.clone()));
    json.insert("target".to_string(), serde_json::Value::String(entry.target.clone()));

    for (key, value) in &entry.fields {
        json.insert(key.clone(), value.clone());
    }

    serde_json::to_string(&json).unwrap_or_else(|_| "Failed to serialize log entry".to_string())
}

fn format_human(entry: &LogEntry) -> String {
    let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
    let mut message =
        format!("{} {:5} [{}] {}", timestamp, level_str(entry), entry.target, entry.message);

    let mut keys: Vec<&String> = entry.fields.keys().collect();
    keys.sort();
    for key in keys {
        message.push_str(&format!(" {}={}", key, field_str(&entry.fields[key])));
    }

    message
}

fn format_logfmt(entry: &LogEntry) -> String {
    let mut parts = vec![
        format!("timestamp={}", entry.timestamp.to_rfc3339()),
        format!("level={}", level_str(entry)),
        format!("target={}", entry.target),
        format!("message=\"{}\"", entry.message.replace('"', "\\\"")),
    ];

    let mut keys: Vec<&String> = entry.fields.keys().collect();
    keys.sort();
    for key in keys {
        let value = &entry.fields[key];
        let value_str = match value {
            serde_json::Value::Number(_) | serde_json::Value::Bool(_) => value.to_string(),
            other => format!("\"{}\"", field_str(other).replace('"', "\\\"")),
        };
        parts.push(format!("{}={}", key, value_str));
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;

    #[test]
    fn test_json_format() {
        let entry = LogEntry::new(LogLevel::Info, "Cache hit".to_string(), "proxy".to_string());

        let formatted = LogFormat::Json.format_entry(&entry);

        let parsed: serde_json::Value = serde_json::from_str(&formatted).unwrap();
        assert_eq!(parsed["message"], "Cache hit");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["target"], "proxy");
    }

    #[test]
    fn test_human_format() {
        let entry = LogEntry::new(LogLevel::Error, "Install failed".to_string(), "lifecycle".to_string())
            .with_field("missing", serde_json::Value::Number(serde_json::Number::from(2)));

        let formatted = LogFormat::Human.format_entry(&entry);

        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("[lifecycle] Install failed"));
        assert!(formatted.contains("missing=2"));
    }

    #[test]
    fn test_logfmt_format() {
        let entry = LogEntry::new(LogLevel::Warn, "say \"hi\"".to_string(), "cache".to_string())
            .with_field("namespace", serde_json::Value::String("runtime-v1".to_string()));

        let formatted = LogFormat::Logfmt.format_entry(&entry);

        assert!(formatted.contains("level=WARN"));
        assert!(formatted.contains("message=\"say \\\"hi\\\"\""));
        assert!(formatted.contains("namespace=\"runtime-v1\""));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Human));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
