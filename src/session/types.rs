//! Session status, snapshot and statistics types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created by `initialize`, handshake not finished yet.
    Initializing,
    /// Handshake done and recently used.
    Active,
    /// No activity for longer than the configured idle time.
    Idle,
    /// Closed; the transport has been handed off for release.
    Closed,
    /// Unrecoverable fault.
    Error,
}

impl SessionStatus {
    /// `Closed` and `Error` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Closed | SessionStatus::Error)
    }

    /// `Active` and `Idle` sessions are the ones a client may still use.
    pub fn is_live(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Idle)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Initializing => write!(f, "initializing"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Closed => write!(f, "closed"),
            SessionStatus::Error => write!(f, "error"),
        }
    }
}

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The client asked for it (e.g. `DELETE /mcp`).
    ClientRequested,
    /// The remote peer went away.
    PeerDisconnected,
    /// Evicted by the idle sweeper.
    IdleTimeout,
    /// The session entered the error state.
    Error,
    /// Host process shutdown.
    Shutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::ClientRequested => write!(f, "client_requested"),
            CloseReason::PeerDisconnected => write!(f, "peer_disconnected"),
            CloseReason::IdleTimeout => write!(f, "idle_timeout"),
            CloseReason::Error => write!(f, "error"),
            CloseReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Result of releasing a session's transport.
///
/// Release is best-effort, so a failure is reported here instead of being
/// returned as an error. The session is closed and removed either way.
#[derive(Debug)]
pub enum CloseOutcome {
    /// The transport closed cleanly.
    Released,
    /// The transport reported an error while closing.
    Failed(TransportError),
}

impl CloseOutcome {
    pub fn is_released(&self) -> bool {
        matches!(self, CloseOutcome::Released)
    }
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Unique session identifier.
    pub id: String,
    /// Status at the time of the snapshot.
    pub status: SessionStatus,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Milliseconds since creation.
    pub age_ms: u64,
    /// Milliseconds since the last recorded activity.
    pub idle_for_ms: u64,
    /// Error message if status is Error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Session counts by state.
///
/// `closed` is part of the reported shape but closed sessions are removed
/// from the store as soon as they close, so in practice it reads 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    pub closed: usize,
}
