//! Core error model.

use thiserror::Error;

/// Result type used by the core primitives.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while constructing or parsing core primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A position string or value was outside the key space.
    #[error("invalid position: {0}")]
    InvalidPosition(String),
}

impl CoreError {
    pub fn invalid_position(msg: impl Into<String>) -> Self {
        Self::InvalidPosition(msg.into())
    }
}
