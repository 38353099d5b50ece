// src/error.rs

//! Unified error handling for the LeafByte core.

use thiserror::Error;

/// Result type alias for LeafByte operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Key-value store access failed
    #[error("Storage error on '{key}': {message}")]
    Storage { key: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Alarm name not mapped to a reset period
    #[error("Unknown alarm: {0}")]
    UnknownAlarm(String),

    /// Tracking was disabled because a host capability is missing
    #[error("Tracking disabled: {0}")]
    TrackingDisabled(String),
}

impl AppError {
    /// Create a storage error for a key.
    pub fn storage(key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
