use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    observer::{LogLevel, LogSink},
    tracker::PresenceTracker,
};

use super::{
    source::{FrameSource, PoseDetector},
    types::{CaptureProgress, RunSummary},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub(crate) struct CaptureJob {
    pub run_id: Uuid,
    pub tracker: PresenceTracker,
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn PoseDetector>,
    pub log_sink: Arc<dyn LogSink>,
    pub progress: watch::Sender<CaptureProgress>,
    pub cancel_token: CancellationToken,
}

/// Reads frames until the source runs dry or the run is cancelled, feeding
/// each detection result into the tracker. Blocking; meant for a worker thread.
pub(crate) fn capture_loop(job: CaptureJob) -> RunSummary {
    let CaptureJob {
        run_id,
        tracker,
        mut source,
        mut detector,
        log_sink,
        progress,
        cancel_token,
    } = job;

    let context = source.kind().context();
    let total_frames = source.total_frames();
    let sessions_before = tracker.session_count();

    let mut frames_processed: u64 = 0;
    let mut frames_skipped: u64 = 0;
    let mut frame_index: u64 = 0;
    let mut cancelled = false;
    let mut read_error = None;

    loop {
        if cancel_token.is_cancelled() {
            cancelled = true;
            log_info!("capture run {run_id} cancelled after {frames_processed} frames");
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                log_error!("frame read failed in run {run_id}: {err:?}");
                log_sink.log(&format!("Frame read failed ({context}): {err:#}"), LogLevel::Error);
                read_error = Some(format!("{err:#}"));
                break;
            }
        };

        let index = frame_index;
        frame_index += 1;

        match detector.detect(&frame) {
            Ok(detected) => tracker.update(detected, context, Some(frame), Some(index)),
            Err(err) => {
                frames_skipped += 1;
                log_warn!("pose detection failed on frame {index}: {err:#}");
            }
        }

        frames_processed += 1;
        progress.send_replace(CaptureProgress {
            run_id: Some(run_id),
            frames_processed,
            total_frames,
            finished: false,
        });
    }

    progress.send_replace(CaptureProgress {
        run_id: Some(run_id),
        frames_processed,
        total_frames,
        finished: true,
    });

    if frames_skipped > 0 {
        log_sink.log(
            &format!("Pose detection failed on {frames_skipped} frame(s); they were skipped"),
            LogLevel::Warning,
        );
    }

    RunSummary {
        run_id,
        context: context.to_string(),
        frames_processed,
        frames_skipped,
        sessions_recorded: tracker.session_count().saturating_sub(sessions_before),
        cancelled,
        read_error,
    }
}
