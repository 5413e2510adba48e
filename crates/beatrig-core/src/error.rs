//! Error types for the lighting core
use thiserror::Error;

/// Core lighting errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// An effect was configured without any colors to cycle through
    #[error("Effect '{effect}' needs at least one color")]
    EmptyPalette { effect: &'static str },

    /// A fixture references a channel outside its 16-channel window
    #[error("Fixture '{fixture}' uses channel {channel}, expected 1-16")]
    InvalidChannel { fixture: String, channel: u16 },

    /// A fixture is addressed outside the 512-channel universe
    #[error("Fixture '{fixture}' starts at channel {first_channel}, expected 1-512")]
    InvalidAddress { fixture: String, first_channel: u16 },

    /// Two fixtures on one controller claim overlapping channel windows
    #[error("Controller {controller}: fixtures at channels {first} and {second} overlap")]
    OverlappingChannels {
        controller: u32,
        first: u16,
        second: u16,
    },

    /// Lighting group is not registered
    #[error("Lights group not found: {0}")]
    GroupNotFound(u32),

    /// Effect name is not present in the registry
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    /// Effect props could not be parsed or are out of range
    #[error("Invalid props for effect '{effect}': {reason}")]
    InvalidEffectProps { effect: String, reason: String },

    /// Handler name is not registered
    #[error("Handler not found: {0}")]
    HandlerNotFound(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
