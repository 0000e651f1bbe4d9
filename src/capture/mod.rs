pub mod controller;
mod loop_worker;
pub mod screenshot;
pub mod source;
pub mod types;

pub use controller::CaptureController;
pub use screenshot::ScreenshotWriter;
pub use source::{FrameSource, PoseDetector, SourceKind};
pub use types::{CaptureProgress, RunSummary};
