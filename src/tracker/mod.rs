pub mod clock;
pub mod controller;
pub mod events;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock, Timebase};
pub use controller::{PresenceTracker, TrackerSnapshot};
pub use events::{PresenceEvent, PresenceListener};
pub use state::{PresenceStatus, TrackerState};
