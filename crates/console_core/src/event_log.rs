//! Append-only diagnostic log with observer notification.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

const OBSERVER_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Position in the log, starting at zero.
    pub sequence: u64,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Session-lifetime event log.
///
/// Entries are never removed or rewritten. Observers registered through
/// [`EventLog::subscribe`] receive every entry appended after registration, in
/// append order; a missing or lagging observer never makes `append` fail.
pub struct EventLog {
    entries: Mutex<Vec<LogEntry>>,
    observers: broadcast::Sender<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        let (observers, _) = broadcast::channel(OBSERVER_CAPACITY);
        Self {
            entries: Mutex::new(Vec::new()),
            observers,
        }
    }

    pub fn append(&self, message: impl Into<String>, severity: Severity) -> LogEntry {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = LogEntry {
            sequence: entries.len() as u64,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        };
        entries.push(entry.clone());
        // Published while the lock is held so observers see append order.
        let _ = self.observers.send(entry.clone());
        entry
    }

    pub fn info(&self, message: impl Into<String>) -> LogEntry {
        self.append(message, Severity::Info)
    }

    pub fn success(&self, message: impl Into<String>) -> LogEntry {
        self.append(message, Severity::Success)
    }

    pub fn warning(&self, message: impl Into<String>) -> LogEntry {
        self.append(message, Severity::Warning)
    }

    pub fn error(&self, message: impl Into<String>) -> LogEntry {
        self.append(message, Severity::Error)
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.observers.subscribe()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/event_log_tests.rs"]
mod tests;
