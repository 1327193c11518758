//! Error types for session management

use std::time::Duration;

use crate::session::SessionStatus;

/// Errors raised by session construction and state transitions.
///
/// An unknown session id is deliberately not represented here: lookups on a
/// missing id return `None` and the caller decides what that means.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid state transition: cannot {operation} a session in state {from}")]
    InvalidStateTransition {
        from: SessionStatus,
        operation: &'static str,
    },
}

impl SessionError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn transition(from: SessionStatus, operation: &'static str) -> Self {
        Self::InvalidStateTransition { from, operation }
    }
}

/// Failure while releasing a session transport.
///
/// These are captured in [`CloseOutcome`](crate::session::CloseOutcome) and
/// logged; they never stop a session from being closed and removed.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport close timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
