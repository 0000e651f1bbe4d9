use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::{seconds_between, DetectionSession};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PresenceStatus {
    Idle,
    Detected,
}

impl Default for PresenceStatus {
    fn default() -> Self {
        PresenceStatus::Idle
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    pub status: PresenceStatus,
    /// Start of the open presence interval; `None` while idle.
    pub started_at: Option<DateTime<Local>>,
    /// Seconds since `started_at`, refreshed on every detected frame.
    pub current_detection_duration: f64,
    /// Start of the most recent presence, kept after it ends.
    pub last_detection_time: Option<DateTime<Local>>,
    pub current_frame_index: Option<u64>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_detected(&self) -> bool {
        self.status == PresenceStatus::Detected
    }

    pub fn begin_presence(&mut self, at: DateTime<Local>) {
        self.status = PresenceStatus::Detected;
        self.started_at = Some(at);
        self.current_detection_duration = 0.0;
        self.last_detection_time = Some(at);
    }

    pub fn extend_presence(&mut self, now: DateTime<Local>) {
        if let Some(start) = self.started_at {
            self.current_detection_duration = seconds_between(start, now).max(0.0);
        }
    }

    /// Closes the open interval. Returns `None` if there was none.
    pub fn end_presence(
        &mut self,
        now: DateTime<Local>,
        context: &str,
    ) -> Option<DetectionSession> {
        self.status = PresenceStatus::Idle;
        self.current_detection_duration = 0.0;
        let start = self.started_at.take()?;
        Some(DetectionSession::new(start, now, context))
    }

    /// Back to idle, dropping any open interval.
    pub fn reset(&mut self) {
        self.status = PresenceStatus::Idle;
        self.started_at = None;
        self.current_detection_duration = 0.0;
        self.current_frame_index = None;
    }
}
