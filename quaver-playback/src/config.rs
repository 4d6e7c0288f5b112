//! Playback core configuration
//!
//! Tunable scheduling parameters with conservative defaults. Values loaded
//! from TOML are clamped to sane minima rather than rejected, so a bad
//! config degrades to defaults instead of refusing to play.

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};

/// Scheduling parameters for the playback core
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Size of the first scheduled buffer in seconds (low-latency start)
    pub initial_buffer_seconds: f64,

    /// Size of each lookahead buffer in seconds
    pub lookahead_buffer_seconds: f64,

    /// Completion poll timer interval in milliseconds
    pub completion_poll_interval_ms: u64,

    /// Numeric tolerance when comparing poll position against a boundary,
    /// in seconds (absorbs floating-point jitter)
    pub completion_tolerance_seconds: f64,

    /// Interval between PositionUpdate events in milliseconds
    pub position_update_interval_ms: u64,

    /// Capacity of the outward event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            initial_buffer_seconds: 2.0,
            lookahead_buffer_seconds: 10.0,
            completion_poll_interval_ms: 125,
            completion_tolerance_seconds: 0.01,
            position_update_interval_ms: 1000,
            event_channel_capacity: 100,
        }
    }
}

impl PlaybackConfig {
    /// Parse configuration from a TOML string, then clamp to valid ranges
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: PlaybackConfig =
            toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        Ok(config.validated())
    }

    /// Clamp out-of-range values to sane minima
    pub fn validated(mut self) -> Self {
        if self.initial_buffer_seconds < 0.25 {
            warn!(
                "initial_buffer_seconds {} below minimum, clamping to 0.25",
                self.initial_buffer_seconds
            );
            self.initial_buffer_seconds = 0.25;
        }
        if self.lookahead_buffer_seconds < self.initial_buffer_seconds {
            warn!(
                "lookahead_buffer_seconds {} below initial buffer, clamping to {}",
                self.lookahead_buffer_seconds, self.initial_buffer_seconds
            );
            self.lookahead_buffer_seconds = self.initial_buffer_seconds;
        }
        if self.completion_poll_interval_ms < 10 {
            warn!(
                "completion_poll_interval_ms {} below minimum, clamping to 10",
                self.completion_poll_interval_ms
            );
            self.completion_poll_interval_ms = 10;
        }
        if self.completion_tolerance_seconds < 0.001 {
            warn!(
                "completion_tolerance_seconds {} below minimum, clamping to 0.001",
                self.completion_tolerance_seconds
            );
            self.completion_tolerance_seconds = 0.001;
        }
        // Position updates clamped to 100-5000ms
        self.position_update_interval_ms = self.position_update_interval_ms.clamp(100, 5000);
        if self.event_channel_capacity < 16 {
            self.event_channel_capacity = 16;
        }
        self
    }
}
