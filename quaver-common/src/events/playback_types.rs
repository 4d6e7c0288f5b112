//! Playback-related type definitions
//!
//! Supporting types for playback state carried inside PlayerEvent payloads.

use serde::{Deserialize, Serialize};

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Current track position snapshot carried in position events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PositionInfo {
    /// Current playback position in seconds
    pub position: f64,
    /// Total track duration in seconds
    pub duration: f64,
}
