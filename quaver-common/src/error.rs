//! Error types shared across Quaver crates
//!
//! Defines the common error type using thiserror for clear error propagation.

use thiserror::Error;

/// Common error type for shared Quaver code
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid playback mode string
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the common Error
pub type Result<T> = std::result::Result<T, Error>;
