use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{
    models::{DetectionSession, Frame},
    observer::{LogLevel, LogSink},
};

use super::{
    clock::{Clock, SystemClock, Timebase},
    events::{PresenceEvent, PresenceListener},
    state::{PresenceStatus, TrackerState},
};

/// Point-in-time view of the tracker, taken under a single lock.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub is_detected: bool,
    pub current_detection_duration: f64,
    pub last_detection_time: Option<DateTime<Local>>,
    pub history: Vec<DetectionSession>,
}

struct TrackerInner {
    state: TrackerState,
    history: Vec<DetectionSession>,
    timebase: Timebase,
    latest_frame: Option<Arc<Frame>>,
}

/// Turns per-frame "pose present" signals into presence sessions.
///
/// Cloning yields another handle to the same tracker. Only one producer may
/// drive `update` at a time; `snapshot` is safe from any thread.
#[derive(Clone)]
pub struct PresenceTracker {
    inner: Arc<RwLock<TrackerInner>>,
    clock: Arc<dyn Clock>,
    log_sink: Option<Arc<dyn LogSink>>,
    listeners: Arc<RwLock<Vec<Arc<dyn PresenceListener>>>>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(TrackerInner {
                state: TrackerState::new(),
                history: Vec::new(),
                timebase: Timebase::WallClock,
                latest_frame: None,
            })),
            clock: Arc::new(SystemClock),
            log_sink: None,
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn subscribe(&self, listener: Arc<dyn PresenceListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// Feeds one frame's detection result into the state machine.
    ///
    /// `frame` and `frame_index` are optional: the frame is cached as the
    /// latest frame and passed along with a "presence started" event, the
    /// index drives timestamps under [`Timebase::VideoFrames`].
    pub fn update(
        &self,
        detected: bool,
        context: &str,
        frame: Option<Frame>,
        frame_index: Option<u64>,
    ) {
        let frame = frame.map(Arc::new);

        let event = {
            let mut inner = self.write();
            let now = inner.timebase.stamp(self.clock.as_ref(), frame_index);

            if let Some(frame) = &frame {
                inner.latest_frame = Some(Arc::clone(frame));
            }
            if frame_index.is_some() {
                inner.state.current_frame_index = frame_index;
            }

            match (inner.state.status, detected) {
                (PresenceStatus::Idle, true) => {
                    inner.state.begin_presence(now);
                    Some(PresenceEvent::Started {
                        context: context.to_string(),
                        at: now,
                        frame,
                        frame_index,
                    })
                }
                (PresenceStatus::Detected, true) => {
                    inner.state.extend_presence(now);
                    None
                }
                (PresenceStatus::Detected, false) => {
                    inner.state.end_presence(now, context).map(|session| {
                        inner.history.push(session.clone());
                        PresenceEvent::Ended { session }
                    })
                }
                (PresenceStatus::Idle, false) => None,
            }
        };

        if let Some(event) = event {
            self.notify(&event);
        }
    }

    /// Forces the tracker back to idle. History is kept; an open interval is
    /// dropped without producing a session.
    pub fn reset(&self) {
        self.write().state.reset();
    }

    /// Resets and selects the timebase for the next capture run.
    pub fn begin_run(&self, timebase: Timebase) {
        let mut inner = self.write();
        inner.state.reset();
        inner.timebase = timebase;
    }

    pub fn timebase(&self) -> Timebase {
        self.read().timebase
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let inner = self.read();
        TrackerSnapshot {
            is_detected: inner.state.is_detected(),
            current_detection_duration: inner.state.current_detection_duration,
            last_detection_time: inner.state.last_detection_time,
            history: inner.history.clone(),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.read().state.clone()
    }

    pub fn is_detected(&self) -> bool {
        self.read().state.is_detected()
    }

    pub fn history(&self) -> Vec<DetectionSession> {
        self.read().history.clone()
    }

    pub fn session_count(&self) -> usize {
        self.read().history.len()
    }

    /// Discards recorded sessions, e.g. after they have been exported.
    pub fn clear_history(&self) {
        self.write().history.clear();
    }

    /// The most recent frame passed to `update`, with its index if one was given.
    pub fn latest_frame(&self) -> Option<(Arc<Frame>, Option<u64>)> {
        let inner = self.read();
        inner
            .latest_frame
            .as_ref()
            .map(|frame| (Arc::clone(frame), inner.state.current_frame_index))
    }

    fn notify(&self, event: &PresenceEvent) {
        if let Some(sink) = &self.log_sink {
            match event {
                PresenceEvent::Started { context, .. } => {
                    sink.log(&format!("Person detected ({context})"), LogLevel::Success)
                }
                PresenceEvent::Ended { session } => sink.log(
                    &format!(
                        "Person left the frame ({}), duration: {:.1} s",
                        session.context(),
                        session.duration()
                    ),
                    LogLevel::Info,
                ),
            }
        }

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_presence(event);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{observer::LogRecorder, tracker::ManualClock};
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    fn t0() -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    struct Fixture {
        tracker: PresenceTracker,
        clock: Arc<ManualClock>,
        log: Arc<LogRecorder>,
        events: Arc<EventLog>,
    }

    #[derive(Default)]
    struct EventLog(Mutex<Vec<PresenceEvent>>);

    impl EventLog {
        fn take(&self) -> Vec<PresenceEvent> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl PresenceListener for EventLog {
        fn on_presence(&self, event: &PresenceEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(t0()));
        let log = Arc::new(LogRecorder::new());
        let events = Arc::new(EventLog::default());
        let tracker = PresenceTracker::new()
            .with_clock(clock.clone())
            .with_log_sink(log.clone());
        tracker.subscribe(events.clone());
        Fixture {
            tracker,
            clock,
            log,
            events,
        }
    }

    fn feed(fx: &Fixture, inputs: &[bool]) {
        for &detected in inputs {
            fx.tracker.update(detected, "webcam", None, None);
            fx.clock.advance(Duration::seconds(1));
        }
    }

    #[test]
    fn single_interval_produces_one_session() {
        let fx = fixture();
        feed(&fx, &[true, true, false]);

        let history = fx.tracker.history();
        assert_eq!(history.len(), 1);
        let session = &history[0];
        assert_eq!(session.start_time(), t0());
        assert_eq!(session.end_time(), t0() + Duration::seconds(2));
        assert_eq!(session.duration(), 2.0);
        assert_eq!(session.context(), "webcam");
        assert!(!fx.tracker.is_detected());
    }

    #[test]
    fn absence_only_never_records() {
        let fx = fixture();
        fx.tracker.update(false, "webcam", None, None);
        assert!(!fx.tracker.is_detected());
        fx.tracker.update(false, "webcam", None, None);
        assert!(!fx.tracker.is_detected());

        assert!(fx.tracker.history().is_empty());
        assert!(fx.log.is_empty());
        assert!(fx.events.take().is_empty());
    }

    #[test]
    fn two_intervals_are_ordered() {
        let fx = fixture();
        feed(&fx, &[true, false, true, false]);

        let history = fx.tracker.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].start_time(), t0());
        assert_eq!(history[1].start_time(), t0() + Duration::seconds(2));
        assert!(history[0].end_time() <= history[1].start_time());
    }

    #[test]
    fn open_interval_is_not_counted() {
        let fx = fixture();
        feed(&fx, &[false, true, false, true, true]);

        assert_eq!(fx.tracker.session_count(), 1);
        assert!(fx.tracker.is_detected());
    }

    #[test]
    fn session_count_matches_falling_edges() {
        let fx = fixture();
        let inputs = [
            true, false, false, true, true, true, false, true, false, false, true,
        ];
        feed(&fx, &inputs);

        let falling_edges = inputs
            .windows(2)
            .filter(|pair| pair[0] && !pair[1])
            .count();
        assert_eq!(fx.tracker.session_count(), falling_edges);
        for session in fx.tracker.history() {
            assert!(session.end_time() >= session.start_time());
            let expected = (session.end_time() - session.start_time()).num_milliseconds() as f64
                / 1000.0;
            assert!((session.duration() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn running_duration_tracks_open_session() {
        let fx = fixture();
        feed(&fx, &[true, true, true]);

        let snapshot = fx.tracker.snapshot();
        assert!(snapshot.is_detected);
        assert_eq!(snapshot.current_detection_duration, 2.0);
        assert!(snapshot.history.is_empty());
        assert_eq!(snapshot.last_detection_time, Some(t0()));
    }

    #[test]
    fn reset_keeps_history() {
        let fx = fixture();
        feed(&fx, &[true, false, true, true]);
        fx.tracker.reset();

        let snapshot = fx.tracker.snapshot();
        assert!(!snapshot.is_detected);
        assert_eq!(snapshot.current_detection_duration, 0.0);
        assert_eq!(snapshot.history.len(), 1);

        // The dropped interval never turns into a session.
        fx.tracker.update(false, "webcam", None, None);
        assert_eq!(fx.tracker.session_count(), 1);
    }

    #[test]
    fn transitions_notify_observers() {
        let fx = fixture();
        feed(&fx, &[true, true, false]);

        let messages = fx.log.messages();
        assert_eq!(
            messages,
            vec![
                ("Person detected (webcam)".to_string(), LogLevel::Success),
                (
                    "Person left the frame (webcam), duration: 2.0 s".to_string(),
                    LogLevel::Info
                ),
            ]
        );

        let events = fx.events.take();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], PresenceEvent::Started { at, .. } if *at == t0()));
        assert!(matches!(&events[1], PresenceEvent::Ended { session } if session.duration() == 2.0));
    }

    #[test]
    fn started_event_carries_frame() {
        let fx = fixture();
        fx.tracker
            .update(true, "video", Some(Frame::solid(4, 4, [1, 2, 3])), Some(7));

        let events = fx.events.take();
        match &events[0] {
            PresenceEvent::Started {
                frame, frame_index, ..
            } => {
                assert_eq!(frame.as_ref().map(|f| f.width()), Some(4));
                assert_eq!(*frame_index, Some(7));
            }
            other => panic!("unexpected event {other:?}"),
        }

        let (latest, index) = fx.tracker.latest_frame().unwrap();
        assert_eq!(latest.height(), 4);
        assert_eq!(index, Some(7));
    }

    #[test]
    fn video_timebase_measures_in_video_time() {
        let fx = fixture();
        let origin = t0() - Duration::days(1);
        fx.tracker.begin_run(Timebase::video(10.0, origin).unwrap());

        for (index, detected) in [false, true, true, true, true, false].into_iter().enumerate() {
            fx.tracker.update(detected, "video", None, Some(index as u64));
        }

        let history = fx.tracker.history();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].start_time(),
            origin + Duration::milliseconds(100)
        );
        assert!((history[0].duration() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn snapshot_is_readable_from_other_threads() {
        let fx = fixture();
        let reader = fx.tracker.clone();
        feed(&fx, &[true, false]);

        let count = std::thread::spawn(move || reader.snapshot().history.len())
            .join()
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn listeners_may_read_snapshot_reentrantly() {
        struct Reentrant {
            tracker: Mutex<Option<PresenceTracker>>,
            seen: Mutex<Vec<usize>>,
        }
        impl PresenceListener for Reentrant {
            fn on_presence(&self, _event: &PresenceEvent) {
                if let Some(tracker) = self.tracker.lock().unwrap().as_ref() {
                    self.seen.lock().unwrap().push(tracker.snapshot().history.len());
                }
            }
        }

        let fx = fixture();
        let listener = Arc::new(Reentrant {
            tracker: Mutex::new(Some(fx.tracker.clone())),
            seen: Mutex::new(Vec::new()),
        });
        fx.tracker.subscribe(listener.clone());
        feed(&fx, &[true, false]);

        assert_eq!(*listener.seen.lock().unwrap(), vec![0, 1]);
        listener.tracker.lock().unwrap().take();
    }

    #[test]
    fn clear_history_discards_sessions() {
        let fx = fixture();
        feed(&fx, &[true, false]);
        fx.tracker.clear_history();
        assert_eq!(fx.tracker.session_count(), 0);
    }
}
