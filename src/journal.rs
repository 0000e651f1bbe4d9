use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use anyhow::{Context, Result};
use chrono::Local;

use crate::observer::{LogLevel, LogSink};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_error;

/// Append-only action log, one `[YYYY-mm-dd HH:MM:SS] action` line per entry.
pub struct ActionJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ActionJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, action: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create journal directory {}", parent.display())
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open journal {}", self.path.display()))?;
        writeln!(
            file,
            "[{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            action
        )
        .with_context(|| format!("failed to append to journal {}", self.path.display()))
    }

    /// Whole journal, empty if it does not exist yet.
    pub fn read_all(&self) -> Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read journal {}", self.path.display()))
    }
}

impl LogSink for ActionJournal {
    fn log(&self, message: &str, level: LogLevel) {
        if let Err(err) = self.record(&format!("{level}: {message}")) {
            log_error!("{err:#}");
        }
    }
}
