//! The `(message, severity)` observer channel.
//!
//! Components that report user-facing outcomes (presence transitions,
//! screenshots, exports, capture runs) take an `Arc<dyn LogSink>` instead of
//! calling into a UI directly. `LogForwarder` routes messages to the `log`
//! facade, `LogRecorder` keeps them in memory for a log pane or a test, and
//! `LogFanout` broadcasts to several sinks.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives human-readable messages tagged with a severity.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, level: LogLevel);
}

/// Forwards messages to the `log` facade under the `posewatch` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogForwarder;

impl LogSink for LogForwarder {
    fn log(&self, message: &str, level: LogLevel) {
        match level {
            LogLevel::Info | LogLevel::Success => {
                log::info!(target: "posewatch", "[{level}] {message}")
            }
            LogLevel::Warning => log::warn!(target: "posewatch", "{message}"),
            LogLevel::Error => log::error!(target: "posewatch", "{message}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// `HH:MM:SS [LEVEL] message`
    pub fn line(&self) -> String {
        format!("{} [{}] {}", self.at.format("%H:%M:%S"), self.level, self.message)
    }
}

/// Keeps every message in memory, in arrival order.
#[derive(Debug, Default)]
pub struct LogRecorder {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(LogEntry::line).collect()
    }

    pub fn messages(&self) -> Vec<(String, LogLevel)> {
        self.entries()
            .into_iter()
            .map(|entry| (entry.message, entry.level))
            .collect()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.level == level)
            .count()
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

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for LogRecorder {
    fn log(&self, message: &str, level: LogLevel) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogEntry {
                at: Local::now(),
                level,
                message: message.to_string(),
            });
    }
}

/// Broadcasts every message to each wrapped sink.
#[derive(Clone, Default)]
pub struct LogFanout {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl LogFanout {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }
}

impl LogSink for LogFanout {
    fn log(&self, message: &str, level: LogLevel) {
        for sink in &self.sinks {
            sink.log(message, level);
        }
    }
}
