//! Offline replay of recorded detection traces.
//!
//! A trace is a text file with one sample per line (`1`/`0`, `true`/`false`,
//! `yes`/`no`). Blank lines and lines starting with `#` are ignored.

use anyhow::{bail, Result};

use crate::tracker::{PresenceTracker, Timebase};

pub fn parse_trace(contents: &str) -> Result<Vec<bool>> {
    let mut samples = Vec::new();
    for (number, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let sample = match line.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => bail!("line {}: unrecognised sample '{other}'", number + 1),
        };
        samples.push(sample);
    }
    Ok(samples)
}

/// Feeds `samples` through the tracker as one capture run and returns the
/// number of sessions it recorded. With a frame rate, timestamps follow the
/// trace's frame positions; without one they come from the tracker's clock.
pub fn replay(
    tracker: &PresenceTracker,
    samples: &[bool],
    fps: Option<f64>,
    context: &str,
) -> usize {
    let timebase = fps
        .and_then(|fps| Timebase::video(fps, tracker.now()))
        .unwrap_or(Timebase::WallClock);
    tracker.begin_run(timebase);

    let before = tracker.session_count();
    for (index, &detected) in samples.iter().enumerate() {
        tracker.update(detected, context, None, Some(index as u64));
    }
    tracker.session_count().saturating_sub(before)
}
