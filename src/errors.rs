//! Standardized error handling
//!
//! Project-wide error type shared across the message pipeline,
//! the channel integrations and the store.

use thiserror::Error;

/// Main project error type
#[derive(Error, Debug)]
pub enum ComptoirError {
    /// Storage related errors
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Channel delivery errors (SMS, Messenger, voice)
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network request errors
    #[error("Network error: {0}")]
    NetworkError(String),

    /// LLM service errors
    #[error("LLM service error: {0}")]
    LlmError(String),

    /// Speech recognition / synthesis errors
    #[error("Speech error: {0}")]
    SpeechError(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Business not found for an inbound channel identity
    #[error("Unknown business: {0}")]
    UnknownBusiness(String),

    /// Unknown errors
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for ComptoirError {
    fn from(err: anyhow::Error) -> Self {
        ComptoirError::Unknown(err.to_string())
    }
}

impl From<std::io::Error> for ComptoirError {
    fn from(err: std::io::Error) -> Self {
        ComptoirError::StorageError(err.to_string())
    }
}

impl From<rusqlite::Error> for ComptoirError {
    fn from(err: rusqlite::Error) -> Self {
        ComptoirError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for ComptoirError {
    fn from(err: serde_json::Error) -> Self {
        ComptoirError::ConfigError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ComptoirError {
    fn from(err: serde_yaml::Error) -> Self {
        ComptoirError::ConfigError(err.to_string())
    }
}

/// Project result type alias
pub type Result<T> = std::result::Result<T, ComptoirError>;
