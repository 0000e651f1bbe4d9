mod types;

pub use types::{ActivitySample, ActivityTimeline};

use std::{collections::VecDeque, sync::Arc, time::Duration};

use chrono::Local;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::tracker::PresenceTracker;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

pub const MAX_SAMPLES: usize = 100;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1_500);

/// Rolling presence timeline for a live activity chart.
///
/// Polls the tracker's snapshot on a fixed interval and keeps the last
/// [`MAX_SAMPLES`] readings. It only reads the tracker, never drives it.
pub struct ActivityMonitor {
    tracker: PresenceTracker,
    interval: Duration,
    inner: Arc<Mutex<ActivityState>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

struct ActivityState {
    samples: VecDeque<ActivitySample>,
    sample_count: u64,
}

impl ActivityMonitor {
    pub fn new(tracker: PresenceTracker, interval: Duration) -> Self {
        Self {
            tracker,
            interval: if interval.is_zero() {
                DEFAULT_INTERVAL
            } else {
                interval
            },
            inner: Arc::new(Mutex::new(ActivityState {
                samples: VecDeque::with_capacity(MAX_SAMPLES),
                sample_count: 0,
            })),
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Starts polling. Calling it while already running is a no-op.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let tracker = self.tracker.clone();
        let inner = Arc::clone(&self.inner);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let detected = tracker.snapshot().is_detected;
                        push_sample(&inner, detected).await;
                    }
                    _ = token.cancelled() => {
                        log_info!("activity monitor shutting down");
                        break;
                    }
                }
            }
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Takes one reading immediately, outside the polling schedule.
    pub async fn sample_now(&self) {
        let detected = self.tracker.snapshot().is_detected;
        push_sample(&self.inner, detected).await;
    }

    pub async fn samples(&self) -> Vec<ActivitySample> {
        self.inner.lock().await.samples.iter().copied().collect()
    }

    pub async fn timeline(&self) -> ActivityTimeline {
        let state = self.inner.lock().await;
        ActivityTimeline {
            samples: state.samples.iter().copied().collect(),
            sample_count: state.sample_count,
            detected_ratio: ratio(&state.samples),
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        state.samples.clear();
        state.sample_count = 0;
    }
}

async fn push_sample(inner: &Mutex<ActivityState>, detected: bool) {
    let mut state = inner.lock().await;
    state.sample_count += 1;
    state.samples.push_back(ActivitySample {
        at: Local::now(),
        detected,
    });
    while state.samples.len() > MAX_SAMPLES {
        state.samples.pop_front();
    }
}

fn ratio(samples: &VecDeque<ActivitySample>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().filter(|s| s.detected).count() as f64 / samples.len() as f64
}
