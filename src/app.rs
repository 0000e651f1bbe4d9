use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use log::{info, warn};
use uuid::Uuid;

use crate::{
    activity::ActivityMonitor,
    capture::{CaptureController, FrameSource, PoseDetector, RunSummary, ScreenshotWriter, SourceKind},
    export::{DataExporter, ExportReport},
    journal::ActionJournal,
    observer::{LogFanout, LogForwarder, LogLevel, LogRecorder, LogSink},
    settings::SettingsStore,
    tracker::PresenceTracker,
};

/// Everything one application session needs, wired together once.
///
/// The tracker is owned here and handed to each collaborator at construction;
/// nothing reaches it through globals.
pub struct AppState {
    pub settings: SettingsStore,
    pub tracker: PresenceTracker,
    pub exporter: DataExporter,
    pub screenshots: Arc<ScreenshotWriter>,
    pub capture: CaptureController,
    pub activity: ActivityMonitor,
    pub journal: Arc<ActionJournal>,
    /// In-memory copy of every user-facing message.
    pub log: Arc<LogRecorder>,
    log_sink: Arc<dyn LogSink>,
}

impl AppState {
    pub fn new(settings_path: PathBuf) -> Result<Self> {
        let settings = SettingsStore::new(settings_path)?;
        let config = settings.get();

        let journal = Arc::new(ActionJournal::new(settings.action_log()));
        let log = Arc::new(LogRecorder::new());
        let sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(LogForwarder), log.clone(), journal.clone()];
        let log_sink: Arc<dyn LogSink> = Arc::new(LogFanout::new(sinks));

        let tracker = PresenceTracker::new().with_log_sink(Arc::clone(&log_sink));

        let screenshots = Arc::new(
            ScreenshotWriter::new(settings.screenshot_dir(), Arc::clone(&log_sink))
                .with_auto(config.autoscreenshot)
                .with_cooldown_secs(config.autoscreenshot_threshold),
        );
        tracker.subscribe(screenshots.clone());

        let exporter = DataExporter::new(settings.export_dir()).with_log_sink(Arc::clone(&log_sink));
        let capture = CaptureController::new(tracker.clone(), Arc::clone(&log_sink));
        let activity = ActivityMonitor::new(
            tracker.clone(),
            Duration::from_millis(config.activity_interval_ms),
        );

        Ok(Self {
            settings,
            tracker,
            exporter,
            screenshots,
            capture,
            activity,
            journal,
            log,
            log_sink,
        })
    }

    pub fn log_sink(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.log_sink)
    }

    pub async fn start_capture(
        &mut self,
        source: Box<dyn FrameSource>,
        detector: Box<dyn PoseDetector>,
    ) -> Result<Uuid> {
        let kind = source.kind();
        let run_id = self.capture.start(source, detector).await?;
        self.record_action(&format!("Capture started: {} (run {run_id})", kind.context()));
        self.activity.start();
        Ok(run_id)
    }

    pub async fn stop_capture(&mut self) -> Result<Option<RunSummary>> {
        let summary = self.capture.stop().await?;
        self.activity.stop().await;
        if summary.is_some() {
            self.record_action("Capture stopped by user");
        }
        Ok(summary)
    }

    /// Waits for the current run to finish. Video files are exported as soon
    /// as they have been processed.
    pub async fn finish_capture(&mut self) -> Result<Option<RunSummary>> {
        let summary = self.capture.wait().await?;
        self.activity.stop().await;

        if let Some(summary) = &summary {
            info!(
                "Run {} done: {} frames, {} sessions",
                summary.run_id, summary.frames_processed, summary.sessions_recorded
            );
            if self.capture.source_kind() == Some(SourceKind::VideoFile) && !summary.cancelled {
                self.export();
            }
        }
        Ok(summary)
    }

    /// Writes both export files from the current history. Write failures are
    /// reported by the exporter itself; only the empty case is logged here.
    pub fn export(&self) -> ExportReport {
        let history = self.tracker.history();
        let report = self.exporter.export_all(&history);
        if history.is_empty() {
            self.log_sink.log(&report.message, LogLevel::Error);
        }
        report
    }

    pub fn take_screenshot(&self) -> Option<PathBuf> {
        let path = self.screenshots.save_latest(&self.tracker, "manual")?;
        self.record_action(&format!("Screenshot saved: {}", path.display()));
        Some(path)
    }

    pub fn set_autoscreenshot(&self, enabled: bool) -> Result<()> {
        self.settings.update(|s| s.autoscreenshot = enabled)?;
        self.screenshots.set_auto_enabled(enabled);
        Ok(())
    }

    fn record_action(&self, action: &str) {
        if let Err(err) = self.journal.record(action) {
            warn!("Failed to record action '{action}': {err:#}");
        }
    }
}
