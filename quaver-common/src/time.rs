//! Time and frame conversion utilities
//!
//! Playback positions are exchanged as f64 seconds at the API surface and
//! as u64 frame counts at the scheduler/render boundary. Conversions
//! truncate toward zero, matching the render engine's frame addressing.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp (for event payloads)
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a position in seconds to a frame offset (truncating)
///
/// Negative inputs clamp to frame 0.
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> u64 {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64) as u64
}

/// Convert a frame offset to a position in seconds
pub fn frames_to_seconds(frames: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    frames as f64 / sample_rate as f64
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}
