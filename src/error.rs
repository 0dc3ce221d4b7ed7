//! Error types for Ratewarden.

use thiserror::Error;

/// Main error type for Ratewarden operations.
///
/// Denial is never an error: limiters report it as a `false` decision.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// Invalid limiter parameters or an unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for LimiterError {
    fn from(err: config::ConfigError) -> Self {
        LimiterError::Config(err.to_string())
    }
}

/// Result type alias for Ratewarden operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
