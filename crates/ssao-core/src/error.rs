//! Error types for ssao-rs.

use thiserror::Error;

/// The main error type for configuration and model operations.
#[derive(Error, Debug)]
pub enum SsaoError {
    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while loading or saving a configuration.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for ssao-rs model operations.
pub type Result<T> = std::result::Result<T, SsaoError>;
