use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use chrono::{DateTime, Local};

use crate::{
    models::Frame,
    observer::{LogLevel, LogSink},
    tracker::{PresenceEvent, PresenceListener, PresenceTracker},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const AUTO_SCREENSHOT_PREFIX: &str = "auto_detect";
const DEFAULT_COOLDOWN_SECS: f64 = 3.0;

/// Writes JPEG snapshots of frames.
///
/// Subscribed to a [`PresenceTracker`] it saves the frame that came with every
/// "presence started" event, at most once per cooldown window. Outcomes are
/// reported through the log sink; nothing is returned to the tracker.
pub struct ScreenshotWriter {
    dir: PathBuf,
    auto_enabled: AtomicBool,
    cooldown_secs: f64,
    last_auto: Mutex<Option<DateTime<Local>>>,
    log_sink: Arc<dyn LogSink>,
}

impl ScreenshotWriter {
    pub fn new(dir: impl Into<PathBuf>, log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            dir: dir.into(),
            auto_enabled: AtomicBool::new(false),
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            last_auto: Mutex::new(None),
            log_sink,
        }
    }

    pub fn with_auto(self, enabled: bool) -> Self {
        self.auto_enabled.store(enabled, Ordering::Relaxed);
        self
    }

    /// Negative or non-finite values disable the cooldown.
    pub fn with_cooldown_secs(mut self, secs: f64) -> Self {
        self.cooldown_secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn set_auto_enabled(&self, enabled: bool) {
        self.auto_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto_enabled.load(Ordering::Relaxed)
    }

    /// Saves `frame` as `<prefix>_<timestamp>.jpg`. Returns the written path,
    /// or `None` after reporting the failure.
    pub fn save(&self, frame: &Frame, prefix: &str) -> Option<PathBuf> {
        if frame.is_empty() {
            self.log_sink
                .log("No usable frame for screenshot (empty image)", LogLevel::Warning);
            return None;
        }

        let path = unique_path(&self.dir, prefix, Local::now());
        let result = fs::create_dir_all(&self.dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| frame.save_jpeg(&path));

        match result {
            Ok(()) => {
                log_info!("screenshot written to {}", path.display());
                self.log_sink
                    .log(&format!("Screenshot saved: {}", path.display()), LogLevel::Success);
                Some(path)
            }
            Err(err) => {
                log_warn!("screenshot write failed for {}: {err:#}", path.display());
                self.log_sink.log(
                    &format!("Failed to save screenshot: {} ({err:#})", path.display()),
                    LogLevel::Error,
                );
                None
            }
        }
    }

    /// Saves the tracker's most recent frame.
    pub fn save_latest(&self, tracker: &PresenceTracker, label: &str) -> Option<PathBuf> {
        match tracker.latest_frame() {
            Some((frame, _)) => self.save(&frame, &format!("screenshot_{label}")),
            None => {
                self.log_sink
                    .log("No frame available for screenshot", LogLevel::Error);
                None
            }
        }
    }

    fn cooldown_elapsed(&self, at: DateTime<Local>) -> bool {
        let last = self.last_auto.lock().unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(previous) => {
                let elapsed = crate::models::seconds_between(previous, at);
                elapsed < 0.0 || elapsed >= self.cooldown_secs
            }
            None => true,
        }
    }
}

impl PresenceListener for ScreenshotWriter {
    fn on_presence(&self, event: &PresenceEvent) {
        let PresenceEvent::Started { frame, at, .. } = event else {
            return;
        };
        if !self.auto_enabled() {
            return;
        }
        let Some(frame) = frame else {
            return;
        };
        if !self.cooldown_elapsed(*at) {
            log_info!("auto screenshot skipped, cooldown of {}s active", self.cooldown_secs);
            return;
        }

        if self.save(frame, AUTO_SCREENSHOT_PREFIX).is_some() {
            *self.last_auto.lock().unwrap_or_else(PoisonError::into_inner) = Some(*at);
        }
    }
}

/// `<prefix>_<YYYYmmdd_HHMMSS_mmm>.jpg`, with a counter appended when that
/// name is already taken.
fn unique_path(dir: &Path, prefix: &str, at: DateTime<Local>) -> PathBuf {
    let stem = format!("{prefix}_{}", at.format("%Y%m%d_%H%M%S_%3f"));
    let mut candidate = dir.join(format!("{stem}.jpg"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}_{counter}.jpg"));
        counter += 1;
    }
    candidate
}
