//! Processor error model.

use std::time::Duration;

use thiserror::Error;

use sspr_storage::{DequeError, StoreError};

use crate::settings::SettingsError;

/// Errors surfaced synchronously by the processor.
///
/// Once `submit` has returned `Ok`, later failures are only visible through
/// logs and [`ProcessorStats`](crate::ProcessorStats).
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The durable queue stayed full for the whole submit wait.
    #[error("queue stayed full for {0:?}")]
    QueueSubmitTimeout(Duration),

    /// The durable queue failed (storage unavailable, ring exhausted, ...).
    #[error(transparent)]
    Queue(#[from] DequeError),

    /// An item or envelope could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// `submit` after `close`.
    #[error("processor is closed")]
    Closed,

    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("failed to spawn thread: {0}")]
    Spawn(String),
}

impl ProcessorError {
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Whether the underlying store failed.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, ProcessorError::Queue(DequeError::StorageUnavailable(_)))
    }
}

impl From<StoreError> for ProcessorError {
    fn from(value: StoreError) -> Self {
        Self::Queue(DequeError::StorageUnavailable(value))
    }
}

impl From<serde_json::Error> for ProcessorError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
