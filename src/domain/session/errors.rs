//! Session-level error types surfaced at the session manager boundary.

use thiserror::Error;

use crate::domain::foundation::{ErrorCode, SessionName, ValidationError};

/// Typed failures returned by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A session with this name is already registered.
    #[error("Session '{0}' already exists")]
    DuplicateSession(SessionName),

    /// The concurrent-session ceiling is reached.
    #[error("Session limit reached ({max} concurrent sessions)")]
    CeilingReached { max: usize },

    /// No session is registered under this name.
    #[error("Session '{0}' not found")]
    NotFound(String),

    /// The transport refused or failed to produce a connection.
    #[error("Transport initialization failed for '{session}': {message}")]
    TransportInitFailed { session: SessionName, message: String },

    /// The name or owner failed validation.
    #[error(transparent)]
    InvalidName(#[from] ValidationError),

    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl SessionError {
    pub fn not_found(name: impl Into<String>) -> Self {
        SessionError::NotFound(name.into())
    }

    pub fn transport_init(session: SessionName, message: impl Into<String>) -> Self {
        SessionError::TransportInitFailed {
            session,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::DuplicateSession(_) => ErrorCode::DuplicateSession,
            SessionError::CeilingReached { .. } => ErrorCode::CeilingReached,
            SessionError::NotFound(_) => ErrorCode::SessionNotFound,
            SessionError::TransportInitFailed { .. } => ErrorCode::TransportInitFailed,
            SessionError::InvalidName(_) => ErrorCode::ValidationFailed,
            SessionError::Storage(_) => ErrorCode::StorageError,
        }
    }
}
