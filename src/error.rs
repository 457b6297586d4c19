// SPDX-License-Identifier: MIT

//! Error types for session synchronization.

/// Errors surfaced by the session engine and store backends.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Caller is not the session host")]
    NotHost,

    #[error("No session attached on this client")]
    NoSession,

    #[error("Session has already ended")]
    Ended,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SyncError>;
