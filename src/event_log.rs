//! Bounded audit trail of detections and remediation attempts
//!
//! The log is a ring buffer: when the configured capacity is reached the
//! oldest entries are evicted first, in insertion order. Nothing here is
//! persisted - this is the in-memory trail exposed to collaborators via
//! the orchestrator's query surface.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    pub details: Option<String>,
}

/// Fixed-capacity event log.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    cap: usize,
}

impl EventLog {
    /// Create a log holding at most `cap` entries. A zero cap is clamped to
    /// one so that `push` always retains the newest entry.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.max(1).min(1024)),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, level: LogLevel, component: &str, message: impl Into<String>) {
        self.push_detailed(level, component, message, None);
    }

    pub fn push_detailed(
        &mut self,
        level: LogLevel,
        component: &str,
        message: impl Into<String>,
        details: Option<String>,
    ) {
        while self.entries.len() >= self.cap {
            self.entries.pop_front();
        }

        self.entries.push_back(LogEntry {
            timestamp: Utc::now(),
            level,
            component: component.to_string(),
            message: message.into(),
            details,
        });
    }

    /// The `n` most recent entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}
