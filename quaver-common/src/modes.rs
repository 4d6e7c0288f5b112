//! Repeat and shuffle playback modes
//!
//! These are plain value objects: the playback core consumes them to drive
//! track sequencing, and the (external) persistence layer serializes them
//! into app state. Nothing here touches the scheduler.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Repeat mode for track sequencing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Play through the sequence once, then stop
    #[default]
    Off,
    /// Repeat the current track indefinitely
    One,
    /// Wrap around at the end of the sequence
    All,
}

impl RepeatMode {
    /// Next mode in the UI toggle cycle (Off → All → One → Off)
    pub fn cycled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

impl std::fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepeatMode::Off => write!(f, "off"),
            RepeatMode::One => write!(f, "one"),
            RepeatMode::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for RepeatMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(RepeatMode::Off),
            "one" => Ok(RepeatMode::One),
            "all" => Ok(RepeatMode::All),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

/// Shuffle mode for track sequencing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    #[default]
    Off,
    On,
}

impl ShuffleMode {
    pub fn is_on(self) -> bool {
        self == ShuffleMode::On
    }

    pub fn toggled(self) -> Self {
        match self {
            ShuffleMode::Off => ShuffleMode::On,
            ShuffleMode::On => ShuffleMode::Off,
        }
    }
}

impl std::fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShuffleMode::Off => write!(f, "off"),
            ShuffleMode::On => write!(f, "on"),
        }
    }
}

impl std::str::FromStr for ShuffleMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ShuffleMode::Off),
            "on" => Ok(ShuffleMode::On),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

/// Combined playback modes, persisted as a unit by the app-state layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlaybackModes {
    pub repeat: RepeatMode,
    pub shuffle: ShuffleMode,
}

impl PlaybackModes {
    pub fn new(repeat: RepeatMode, shuffle: ShuffleMode) -> Self {
        Self { repeat, shuffle }
    }
}
