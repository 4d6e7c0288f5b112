//! # Quaver Common Library
//!
//! Shared code for the Quaver music player, consumed by the playback core
//! and by the UI / persistence layers:
//! - Event types (PlayerEvent enum) and the EventBus
//! - Repeat/shuffle playback modes (persisted value object)
//! - Time and frame conversion utilities
//! - Shared error type

pub mod error;
pub mod events;
pub mod modes;
pub mod time;

pub use error::{Error, Result};
pub use modes::{PlaybackModes, RepeatMode, ShuffleMode};
