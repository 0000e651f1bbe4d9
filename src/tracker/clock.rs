use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Local};

/// Source of wall-clock timestamps for presence transitions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to. Used for replays and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Frame rates below this are treated as broken container metadata.
pub const MIN_VIDEO_FPS: f64 = 1e-3;

/// How a capture run converts observations into timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Timebase {
    /// Stamp every observation with the tracker's clock.
    #[default]
    WallClock,
    /// Stamp observations as `origin + frame_index / fps`, so offline files
    /// yield in-video durations rather than processing time.
    VideoFrames { fps: f64, origin: DateTime<Local> },
}

impl Timebase {
    /// `None` unless `fps` is finite and at least [`MIN_VIDEO_FPS`].
    pub fn video(fps: f64, origin: DateTime<Local>) -> Option<Self> {
        (fps.is_finite() && fps >= MIN_VIDEO_FPS).then_some(Timebase::VideoFrames { fps, origin })
    }

    /// Observations without a frame index, or whose offset falls outside the
    /// representable range, fall back to the clock.
    pub fn stamp(&self, clock: &dyn Clock, frame_index: Option<u64>) -> DateTime<Local> {
        match (*self, frame_index) {
            (Timebase::VideoFrames { fps, origin }, Some(index)) => {
                let micros = (index as f64 / fps * 1_000_000.0).round() as i64;
                origin
                    .checked_add_signed(Duration::microseconds(micros))
                    .unwrap_or_else(|| clock.now())
            }
            _ => clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn origin() -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(origin());
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), origin() + Duration::seconds(5));
    }

    #[test]
    fn video_timebase_uses_frame_index() {
        let clock = ManualClock::new(origin() + Duration::hours(1));
        let timebase = Timebase::video(25.0, origin()).unwrap();

        assert_eq!(timebase.stamp(&clock, Some(0)), origin());
        assert_eq!(
            timebase.stamp(&clock, Some(50)),
            origin() + Duration::seconds(2)
        );
        assert_eq!(timebase.stamp(&clock, None), clock.now());
    }

    #[test]
    fn rejects_unusable_frame_rates() {
        assert!(Timebase::video(0.0, origin()).is_none());
        assert!(Timebase::video(-30.0, origin()).is_none());
        assert!(Timebase::video(f64::NAN, origin()).is_none());
        assert!(Timebase::video(1e-15, origin()).is_none());
        assert!(Timebase::video(MIN_VIDEO_FPS, origin()).is_some());
    }

    #[test]
    fn out_of_range_offset_falls_back_to_clock() {
        let clock = ManualClock::new(origin());
        let timebase = Timebase::video(MIN_VIDEO_FPS, origin()).unwrap();

        assert_eq!(timebase.stamp(&clock, Some(u64::MAX)), clock.now());
    }

    #[test]
    fn wall_clock_ignores_frame_index() {
        let clock = ManualClock::new(origin());
        assert_eq!(Timebase::WallClock.stamp(&clock, Some(900)), origin());
    }
}
