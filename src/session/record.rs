//! A single session and its state machine.
//!
//! ```text
//! Initializing ──activate──▶ Active ◀──touch── Idle
//!                              │                ▲
//!                              └──(stale)───────┘
//!   any ──fail──▶ Error        any ──close──▶ Closed
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::types::{CloseOutcome, CloseReason, SessionInfo, SessionStatus};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::transport::SessionTransport;

/// A session record owning its transport.
pub struct SessionRecord<T> {
    id: String,
    status: SessionStatus,
    created_at: Instant,
    created_at_wall: DateTime<Utc>,
    last_activity_at: Instant,
    transport: Option<Arc<T>>,
    config: SessionConfig,
    error: Option<String>,
}

impl<T: SessionTransport> SessionRecord<T> {
    /// Build a new `Initializing` record. Fails if `config` is invalid.
    pub fn new(id: impl Into<String>, transport: Arc<T>, config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        let now = Instant::now();
        Ok(Self {
            id: id.into(),
            status: SessionStatus::Initializing,
            created_at: now,
            created_at_wall: Utc::now(),
            last_activity_at: now,
            transport: Some(transport),
            config,
            error: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The transport, until the record is closed.
    pub fn transport(&self) -> Option<&Arc<T>> {
        self.transport.as_ref()
    }

    /// Finish the handshake: `Initializing` → `Active`.
    pub fn activate(&mut self) -> SessionResult<()> {
        if self.status != SessionStatus::Initializing {
            return Err(SessionError::transition(self.status, "activate"));
        }
        self.status = SessionStatus::Active;
        self.stamp_activity();
        Ok(())
    }

    /// Record activity. An `Idle` session becomes `Active` again.
    ///
    /// On an `Initializing` session this only refreshes the activity time.
    pub fn touch(&mut self) -> SessionResult<()> {
        match self.status {
            SessionStatus::Active | SessionStatus::Initializing => {}
            SessionStatus::Idle => self.status = SessionStatus::Active,
            SessionStatus::Closed | SessionStatus::Error => {
                return Err(SessionError::transition(self.status, "touch"));
            }
        }
        self.stamp_activity();
        Ok(())
    }

    /// True when the last activity is older than `max_idle_time`.
    pub fn is_stale(&self) -> bool {
        self.last_activity_at.elapsed() > self.config.max_idle_time
    }

    /// `Active` → `Idle` when stale. Returns whether the status changed.
    pub fn mark_idle_if_stale(&mut self) -> bool {
        if self.status == SessionStatus::Active && self.is_stale() {
            self.status = SessionStatus::Idle;
            debug!(session_id = %self.id, "Session went idle");
            return true;
        }
        false
    }

    /// Move to `Error`, keeping the message. No-op on a closed record.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status == SessionStatus::Closed {
            return;
        }
        self.status = SessionStatus::Error;
        self.error = Some(message.into());
    }

    /// Close the record.
    ///
    /// The status flips to `Closed` here, synchronously; the returned
    /// [`TransportRelease`] performs the asynchronous part. Returns `None`
    /// when the record was already closed.
    pub fn close(&mut self, reason: CloseReason) -> Option<TransportRelease<T>> {
        if self.status == SessionStatus::Closed {
            return None;
        }
        self.status = SessionStatus::Closed;
        self.transport.take().map(|transport| TransportRelease {
            session_id: self.id.clone(),
            reason,
            transport,
        })
    }

    /// Whether the sweeper should remove this record.
    pub fn should_evict(&self) -> bool {
        match self.status {
            SessionStatus::Closed | SessionStatus::Error => true,
            SessionStatus::Idle => self.is_stale(),
            SessionStatus::Initializing | SessionStatus::Active => false,
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            status: self.status,
            created_at: self.created_at_wall,
            age_ms: millis(self.created_at.elapsed()),
            idle_for_ms: millis(self.last_activity_at.elapsed()),
            error: self.error.clone(),
        }
    }

    fn stamp_activity(&mut self) {
        // Instant is monotonic, so this never moves before created_at.
        self.last_activity_at = Instant::now();
    }
}

impl<T> std::fmt::Debug for SessionRecord<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("last_activity_at", &self.last_activity_at)
            .field("has_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

/// Pending release of a closed session's transport.
#[must_use = "the transport is only released when `release` is awaited"]
pub struct TransportRelease<T> {
    session_id: String,
    reason: CloseReason,
    transport: Arc<T>,
}

impl<T: SessionTransport> TransportRelease<T> {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn reason(&self) -> CloseReason {
        self.reason
    }

    /// Close the transport. Failures are logged and returned, never raised.
    pub async fn release(self) -> CloseOutcome {
        match self.transport.close().await {
            Ok(()) => {
                debug!(session_id = %self.session_id, reason = %self.reason, "Transport released");
                CloseOutcome::Released
            }
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    reason = %self.reason,
                    error = %e,
                    "Failed to release transport"
                );
                CloseOutcome::Failed(e)
            }
        }
    }
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
