//! Server error types.

use arena_core::ArenaError;
use thiserror::Error;

/// Errors that can occur in the server runtime.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A coordinator or member operation failed where the runtime expected
    /// it to succeed.
    #[error("arena error: {0}")]
    Arena(#[from] ArenaError),

    /// A spawned task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
