//! Error types for the control system
use thiserror::Error;

/// Control system errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// The beat scheduler was bound to a bus twice
    #[error("Beat scheduler already initialized")]
    AlreadyInitialized,

    /// The beat scheduler was used before being bound to a bus
    #[error("Beat scheduler not initialized")]
    NotInitialized,

    /// Playback source returned an unexpected answer
    #[error("Playback error: {0}")]
    PlaybackError(String),

    /// An operation ran past its deadline
    #[error("Timed out: {0}")]
    Timeout(&'static str),

    /// DMX error
    #[error("DMX error: {0}")]
    DmxError(String),

    /// No transport endpoint with this id
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Lighting model error
    #[error(transparent)]
    CoreError(#[from] beatrig_core::CoreError),
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
