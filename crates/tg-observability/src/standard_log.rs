//! The standards log.
//!
//! Standards report what they did per tenant through a [`StandardLogger`].
//! Entries carry a severity, the tenant, a human message and optional
//! structured data. The tracing implementation forwards entries to the
//! subscriber set up in [`crate::logging`]; the memory implementation keeps
//! them for inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::RwLock;
use tracing::{debug, error, info, warn};

/// API name attached to entries written by standards.
pub const STANDARDS_API: &str = "Standards";

/// Severity of a standards log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A single standards log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardLogEntry {
    pub timestamp: DateTime<Utc>,
    pub api: String,
    pub tenant: String,
    pub severity: LogSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Sink for per-tenant standards messages.
pub trait StandardLogger: Send + Sync {
    /// Writes an entry.
    fn log(&self, severity: LogSeverity, tenant: &str, message: &str, data: Option<Value>);

    /// Writes an info entry without data.
    fn info(&self, tenant: &str, message: &str) {
        self.log(LogSeverity::Info, tenant, message, None);
    }

    /// Writes an error entry.
    fn error(&self, tenant: &str, message: &str, data: Option<Value>) {
        self.log(LogSeverity::Error, tenant, message, data);
    }
}

/// Forwards entries to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingStandardLogger {
    api: String,
}

impl TracingStandardLogger {
    pub fn new() -> Self {
        Self::with_api(STANDARDS_API)
    }

    pub fn with_api(api: &str) -> Self {
        Self {
            api: api.to_string(),
        }
    }
}

impl Default for TracingStandardLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardLogger for TracingStandardLogger {
    fn log(&self, severity: LogSeverity, tenant: &str, message: &str, data: Option<Value>) {
        let data = data.map(|d| d.to_string()).unwrap_or_default();
        let api = self.api.as_str();
        match severity {
            LogSeverity::Debug => debug!(api, tenant, data, "{}", message),
            LogSeverity::Info => info!(api, tenant, data, "{}", message),
            LogSeverity::Warning => warn!(api, tenant, data, "{}", message),
            LogSeverity::Error | LogSeverity::Critical => {
                error!(api, tenant, data, severity = %severity, "{}", message)
            }
        }
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryStandardLogger {
    entries: RwLock<Vec<StandardLogEntry>>,
}

impl MemoryStandardLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all entries.
    pub fn entries(&self) -> Vec<StandardLogEntry> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the entries with the given severity.
    pub fn entries_at(&self, severity: LogSeverity) -> Vec<StandardLogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.severity == severity)
            .collect()
    }

    /// Returns true if any entry message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(needle))
    }
}

impl StandardLogger for MemoryStandardLogger {
    fn log(&self, severity: LogSeverity, tenant: &str, message: &str, data: Option<Value>) {
        let entry = StandardLogEntry {
            timestamp: Utc::now(),
            api: STANDARDS_API.to_string(),
            tenant: tenant.to_string(),
            severity,
            message: message.to_string(),
            data,
        };
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_records_entries() {
        let logger = MemoryStandardLogger::new();
        logger.info("contoso.onmicrosoft.com", "all good");
        logger.error(
            "contoso.onmicrosoft.com",
            "write failed",
            Some(serde_json::json!({"code": "Forbidden"})),
        );

        let entries = logger.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].severity, LogSeverity::Info);
        assert_eq!(entries[0].api, STANDARDS_API);
        assert_eq!(entries[1].data, Some(serde_json::json!({"code": "Forbidden"})));
        assert_eq!(logger.entries_at(LogSeverity::Error).len(), 1);
        assert!(logger.contains("write failed"));
        assert!(!logger.contains("nothing"));
    }

    #[test]
    fn test_tracing_logger_does_not_panic_without_subscriber() {
        let logger = TracingStandardLogger::new();
        logger.log(LogSeverity::Critical, "tenant", "message", None);
        logger.log(LogSeverity::Warning, "tenant", "message", Some(Value::Null));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(LogSeverity::Error > LogSeverity::Info);
        assert_eq!(LogSeverity::Warning.to_string(), "warning");
    }
}
