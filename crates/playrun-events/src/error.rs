//! Error types for playrun-events

use thiserror::Error;

/// Errors that can occur while querying an event store
#[derive(Error, Debug)]
pub enum EventError {
    /// Store backend failed
    #[error("Event store query failed: {0}")]
    Backend(String),

    /// Stream name not recognised
    #[error("Unknown event stream: {0}")]
    UnknownStream(String),
}

/// Result type for event operations
pub type EventResult<T> = std::result::Result<T, EventError>;
