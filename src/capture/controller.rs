use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    observer::{LogLevel, LogSink},
    tracker::{PresenceTracker, Timebase},
};

use super::{
    loop_worker::{capture_loop, CaptureJob},
    source::{FrameSource, PoseDetector, SourceKind},
    types::{CaptureProgress, RunSummary},
};

/// Owns the single capture worker that drives a [`PresenceTracker`].
///
/// At most one run is active at a time; starting a second one while the
/// first is still reading frames is refused.
pub struct CaptureController {
    tracker: PresenceTracker,
    log_sink: Arc<dyn LogSink>,
    handle: Option<JoinHandle<RunSummary>>,
    cancel_token: Option<CancellationToken>,
    progress_tx: watch::Sender<CaptureProgress>,
    run_id: Option<Uuid>,
    kind: Option<SourceKind>,
}

impl CaptureController {
    pub fn new(tracker: PresenceTracker, log_sink: Arc<dyn LogSink>) -> Self {
        let (progress_tx, _) = watch::channel(CaptureProgress::default());
        Self {
            tracker,
            log_sink,
            handle: None,
            cancel_token: None,
            progress_tx,
            run_id: None,
            kind: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn current_run(&self) -> Option<Uuid> {
        self.run_id
    }

    /// Kind of the source used by the current or most recent run.
    pub fn source_kind(&self) -> Option<SourceKind> {
        self.kind
    }

    pub fn progress(&self) -> watch::Receiver<CaptureProgress> {
        self.progress_tx.subscribe()
    }

    pub async fn start(
        &mut self,
        source: Box<dyn FrameSource>,
        detector: Box<dyn PoseDetector>,
    ) -> Result<Uuid> {
        if self.is_active() {
            bail!(
                "capture already active (run {})",
                self.run_id.map(|id| id.to_string()).unwrap_or_default()
            );
        }

        // A previous run that ended on its own but was never collected.
        if let Some(summary) = self.join().await? {
            info!("Collected finished capture run {}", summary.run_id);
        }

        let kind = source.kind();
        let timebase = match (kind, source.frame_rate()) {
            (SourceKind::VideoFile, Some(fps)) => {
                Timebase::video(fps, self.tracker.now()).unwrap_or(Timebase::WallClock)
            }
            _ => Timebase::WallClock,
        };
        self.tracker.begin_run(timebase);

        let run_id = Uuid::new_v4();
        let cancel_token = CancellationToken::new();
        self.progress_tx.send_replace(CaptureProgress {
            run_id: Some(run_id),
            frames_processed: 0,
            total_frames: source.total_frames(),
            finished: false,
        });

        let job = CaptureJob {
            run_id,
            tracker: self.tracker.clone(),
            source,
            detector,
            log_sink: Arc::clone(&self.log_sink),
            progress: self.progress_tx.clone(),
            cancel_token: cancel_token.clone(),
        };

        let handle = tokio::task::spawn_blocking(move || capture_loop(job));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.run_id = Some(run_id);
        self.kind = Some(kind);

        info!("Capture run {run_id} started ({})", kind.context());
        self.log_sink
            .log(&format!("Capture started ({})", kind.context()), LogLevel::Info);
        Ok(run_id)
    }

    /// Cancels the active run and waits for the worker to exit.
    pub async fn stop(&mut self) -> Result<Option<RunSummary>> {
        match self.cancel_token.take() {
            Some(token) => token.cancel(),
            None => {
                self.log_sink.log("Capture is not active", LogLevel::Warning);
                return Ok(None);
            }
        }
        self.join().await
    }

    /// Waits for the active run to exhaust its source.
    pub async fn wait(&mut self) -> Result<Option<RunSummary>> {
        self.join().await
    }

    async fn join(&mut self) -> Result<Option<RunSummary>> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };
        self.cancel_token = None;

        let summary = handle.await.context("capture worker failed to join")?;

        let message = format!(
            "Capture {} ({}): {} frames, {} session(s) recorded",
            if summary.cancelled { "stopped" } else { "finished" },
            summary.context,
            summary.frames_processed,
            summary.sessions_recorded
        );
        let level = if summary.read_error.is_some() {
            LogLevel::Warning
        } else {
            LogLevel::Success
        };
        self.log_sink.log(&message, level);

        Ok(Some(summary))
    }
}
