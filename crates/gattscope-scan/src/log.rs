//! Log and error sinks filled during a scan

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of display lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSink {
    entries: Vec<String>,
}

impl LogSink {
    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => f.write_str("WARN"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// The two sinks a scan writes to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLog {
    pub logs: LogSink,
    pub errors: LogSink,
}

impl ScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name: value` to the log sink and return the line
    pub fn log(&mut self, name: &str, value: impl fmt::Display) -> String {
        let line = format!("{}: {}", name, value);
        self.logs.push(line.clone());
        line
    }

    /// Append `WARN: message` or `ERROR: message` to the error sink and return the line
    pub fn error(&mut self, severity: Severity, message: impl fmt::Display) -> String {
        let line = format!("{}: {}", severity, message);
        self.errors.push(line.clone());
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_formats() {
        let mut log = ScanLog::new();
        assert_eq!(log.log("device.connected", false), "device.connected: false");
        assert_eq!(log.log("device.name", ""), "device.name: ");
        assert_eq!(log.error(Severity::Warn, "careful"), "WARN: careful");
        assert_eq!(log.error(Severity::Error, "broken"), "ERROR: broken");
        assert_eq!(log.logs.len(), 2);
        assert_eq!(log.errors.entries(), ["WARN: careful", "ERROR: broken"]);
    }

    #[test]
    fn test_sinks_clear_independently() {
        let mut log = ScanLog::new();
        log.log("a", 1);
        log.error(Severity::Error, "b");

        log.logs.clear();
        assert!(log.logs.is_empty());
        assert_eq!(log.errors.len(), 1);

        log.log("c", 2);
        log.errors.clear();
        assert_eq!(log.logs.entries(), ["c: 2"]);
        assert!(log.errors.is_empty());
    }
}
