use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::models::{DetectionSession, Frame};

/// A presence transition, delivered to listeners after the tracker has
/// committed it.
#[derive(Debug, Clone)]
pub enum PresenceEvent {
    Started {
        context: String,
        at: DateTime<Local>,
        frame: Option<Arc<Frame>>,
        frame_index: Option<u64>,
    },
    Ended {
        session: DetectionSession,
    },
}

impl PresenceEvent {
    pub fn context(&self) -> &str {
        match self {
            PresenceEvent::Started { context, .. } => context,
            PresenceEvent::Ended { session } => session.context(),
        }
    }
}

/// Subscribes to presence transitions.
///
/// Listeners run inline inside [`PresenceTracker::update`], on the capture
/// worker that drives the tracker. Whatever they do (file writes, image
/// encoding) delays the next frame, so heavy work should be handed off.
///
/// [`PresenceTracker::update`]: super::PresenceTracker::update
pub trait PresenceListener: Send + Sync {
    fn on_presence(&self, event: &PresenceEvent);
}
