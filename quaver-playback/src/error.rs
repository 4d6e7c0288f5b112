//! Error types for quaver-playback
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Stale-session races are deliberately NOT represented here:
//! they are expected benign conditions handled by silently dropping the
//! callback, never by returning an error.

use thiserror::Error;

/// Main error type for the playback core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Track audio metadata failed preparation validation
    #[error("Track not prepared: {0}")]
    NotPrepared(String),

    /// Disk read failed while scheduling; the track cannot be played
    #[error("Track unplayable: {0}")]
    TrackUnplayable(String),

    /// Loop construction rejected (end at or before start, out of range)
    #[error("Invalid loop: {0}")]
    InvalidLoop(String),

    /// Seek target rejected
    #[error("Invalid seek: {0}")]
    InvalidSeek(String),

    /// Operation not valid in the current playback state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the playback Error
pub type Result<T> = std::result::Result<T, Error>;
