//! Completed presence intervals.

use chrono::{DateTime, Local};
use serde::Serialize;

/// One completed presence interval.
///
/// Built only when presence ends, never mutated afterwards. `duration` is
/// derived from the two timestamps at construction time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSession {
    start_time: DateTime<Local>,
    end_time: DateTime<Local>,
    duration: f64,
    context: String,
}

impl DetectionSession {
    /// An `end_time` earlier than `start_time` is clamped to `start_time`.
    pub fn new(
        start_time: DateTime<Local>,
        end_time: DateTime<Local>,
        context: impl Into<String>,
    ) -> Self {
        let end_time = end_time.max(start_time);
        Self {
            start_time,
            end_time,
            duration: seconds_between(start_time, end_time),
            context: context.into(),
        }
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Local> {
        self.end_time
    }

    /// Seconds between start and end.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

/// Signed seconds from `start` to `end`, microsecond resolution.
pub(crate) fn seconds_between(start: DateTime<Local>, end: DateTime<Local>) -> f64 {
    let delta = end.signed_duration_since(start);
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}
