use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureProgress {
    pub run_id: Option<Uuid>,
    pub frames_processed: u64,
    pub total_frames: Option<u64>,
    pub finished: bool,
}

impl CaptureProgress {
    /// Whole percent, when the source length is known.
    pub fn percent(&self) -> Option<u8> {
        match self.total_frames {
            Some(0) => Some(100),
            Some(total) => {
                let pct = (self.frames_processed.min(total) * 100) / total;
                Some(pct as u8)
            }
            None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub context: String,
    pub frames_processed: u64,
    /// Frames dropped because pose detection failed on them.
    pub frames_skipped: u64,
    pub sessions_recorded: usize,
    pub cancelled: bool,
    pub read_error: Option<String>,
}
