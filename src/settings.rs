use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Read by front ends that open the webcam on launch; the library itself
    /// never starts a capture on its own.
    pub auto_start_camera: bool,
    pub autoscreenshot: bool,
    /// Minimum seconds between two automatic screenshots.
    pub autoscreenshot_threshold: f64,
    pub screenshot_dir: PathBuf,
    pub export_dir: PathBuf,
    pub action_log: PathBuf,
    pub activity_interval_ms: u64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            auto_start_camera: false,
            autoscreenshot: false,
            autoscreenshot_threshold: 3.0,
            screenshot_dir: PathBuf::from("screenshots"),
            export_dir: PathBuf::from("exports"),
            action_log: PathBuf::from("logs.txt"),
            activity_interval_ms: 1_500,
        }
    }
}

/// `settings.json` backed store. Relative paths inside the settings resolve
/// against the directory holding the file.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Loads `path`, writing defaults when it does not exist yet. A file that
    /// fails to parse is replaced by defaults in memory only.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(err) => {
                    log_warn!(
                        "Ignoring unreadable settings in {}: {err}; using defaults",
                        path.display()
                    );
                    UserSettings::default()
                }
            }
        } else {
            let defaults = UserSettings::default();
            persist(&path, &defaults)?;
            defaults
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> UserSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `change` and writes the result to disk.
    pub fn update(&self, change: impl FnOnce(&mut UserSettings)) -> Result<UserSettings> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        change(&mut next);
        persist(&self.path, &next)?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", self.path.display()))?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.path.parent() {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.resolve(&self.get().screenshot_dir)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.resolve(&self.get().export_dir)
    }

    pub fn action_log(&self) -> PathBuf {
        self.resolve(&self.get().action_log)
    }
}

fn persist(path: &Path, data: &UserSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
    }
    let serialized = serde_json::to_string_pretty(data)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write settings to {}", path.display()))
}
