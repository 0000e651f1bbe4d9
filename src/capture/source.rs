use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::Frame;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Webcam,
    VideoFile,
}

impl SourceKind {
    /// Context label carried into every session recorded from this source.
    pub fn context(&self) -> &'static str {
        match self {
            SourceKind::Webcam => "webcam",
            SourceKind::VideoFile => "video",
        }
    }
}

/// A camera or decoded video file, read one frame at a time.
///
/// `next_frame` may block; it runs on the capture worker, never on the
/// caller's thread.
pub trait FrameSource: Send {
    fn kind(&self) -> SourceKind;

    /// Nominal frames per second, if the container reports one.
    fn frame_rate(&self) -> Option<f64> {
        None
    }

    fn total_frames(&self) -> Option<u64> {
        None
    }

    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Pose estimation backend. Answers whether pose landmarks were found.
pub trait PoseDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<bool>;
}

impl<F> PoseDetector for F
where
    F: FnMut(&Frame) -> Result<bool> + Send,
{
    fn detect(&mut self, frame: &Frame) -> Result<bool> {
        self(frame)
    }
}
