mod frame;
mod session;

pub use frame::Frame;
pub use session::DetectionSession;
pub(crate) use session::seconds_between;
