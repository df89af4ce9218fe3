//! Operator-facing activity log.
//!
//! Every component receives a [`SharedLog`] and appends human-readable
//! lifecycle and error entries to it. The log is append-only: insertion
//! order is display order and nothing is ever evicted.
//!
//! Entries are mirrored to `tracing` so they also show up in the process
//! logs.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{info, warn};

// ============================================================================
// Types
// ============================================================================

/// Shared handle to a log sink.
pub type SharedLog = Arc<dyn LogSink>;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Lifecycle information.
    Info,
    /// Something went wrong.
    Error,
}

// ============================================================================
// LogEntry
// ============================================================================

/// One timestamped line of the activity log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Wall-clock time the entry was created.
    pub timestamp: DateTime<Local>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
}

impl LogEntry {
    /// Creates an entry stamped now with the message as given.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    /// Creates an info entry stamped now.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    /// Creates an error entry stamped now.
    ///
    /// The message is prefixed with `Error: `.
    #[must_use]
    pub fn error(message: impl fmt::Display) -> Self {
        Self {
            timestamp: Local::now(),
            level: LogLevel::Error,
            message: format!("Error: {message}"),
        }
    }

    /// Returns `true` for error entries.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

// ============================================================================
// LogSink
// ============================================================================

/// Append-only destination for [`LogEntry`] values.
pub trait LogSink: Send + Sync {
    /// Appends one entry.
    fn append(&self, entry: LogEntry);
}

/// Convenience helpers over any [`LogSink`].
pub trait LogSinkExt {
    /// Appends an info entry.
    fn info(&self, message: impl Into<String>);

    /// Appends an error entry.
    fn error(&self, message: impl fmt::Display);
}

impl<S: LogSink + ?Sized> LogSinkExt for S {
    fn info(&self, message: impl Into<String>) {
        self.append(LogEntry::info(message));
    }

    fn error(&self, message: impl fmt::Display) {
        self.append(LogEntry::error(message));
    }
}

// ============================================================================
// ActivityLog
// ============================================================================

/// In-memory activity log.
///
/// Cloning yields another handle to the same entries.
#[derive(Clone, Default)]
pub struct ActivityLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl ActivityLog {
    /// Creates an empty log.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this log as a [`SharedLog`].
    #[must_use]
    pub fn shared(&self) -> SharedLog {
        Arc::new(self.clone())
    }

    /// Returns a copy of all entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Returns all messages in insertion order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.message.clone()).collect()
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing has been logged.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the number of error entries.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.entries.lock().iter().filter(|e| e.is_error()).count()
    }

    /// Returns `true` if any message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(needle))
    }
}

impl LogSink for ActivityLog {
    fn append(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => info!(target: "imagoiq_capture::activity", "{}", entry.message),
            LogLevel::Error => warn!(target: "imagoiq_capture::activity", "{}", entry.message),
        }
        self.entries.lock().push(entry);
    }
}

impl fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityLog")
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
