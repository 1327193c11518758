//! In-memory session store.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::record::{SessionRecord, TransportRelease};
use super::types::{CloseOutcome, CloseReason, SessionInfo, SessionStats, SessionStatus};
use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::transport::SessionTransport;

/// Store of live sessions keyed by session id.
///
/// The lock is only ever held for synchronous sections; transports are
/// released after their record has been closed and taken out of the map, so
/// a concurrent lookup never sees a half-closed session.
pub struct SessionStore<T> {
    config: SessionConfig,
    sessions: Mutex<HashMap<String, SessionRecord<T>>>,
}

impl<T: SessionTransport> SessionStore<T> {
    /// Create an empty store. `config` is the default for [`Self::create_default`].
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Insert a new `Initializing` session with a fresh id.
    ///
    /// Nothing is inserted when `config` is invalid.
    pub fn create(&self, transport: Arc<T>, config: SessionConfig) -> SessionResult<SessionInfo> {
        config.validate()?;

        let mut sessions = self.sessions.lock();
        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let record = SessionRecord::new(id.clone(), transport, config)?;
        let info = record.info();
        sessions.insert(id, record);

        info!(session_id = %info.id, total = sessions.len(), "Session created");
        Ok(info)
    }

    /// [`Self::create`] with the store's own config.
    pub fn create_default(&self, transport: Arc<T>) -> SessionResult<SessionInfo> {
        self.create(transport, self.config)
    }

    /// Look up a session, flagging it idle first if it has gone stale.
    pub fn get(&self, id: &str) -> Option<SessionInfo> {
        let mut sessions = self.sessions.lock();
        let record = sessions.get_mut(id)?;
        record.mark_idle_if_stale();
        Some(record.info())
    }

    /// Record activity on a session. Unknown ids are a no-op.
    pub fn touch(&self, id: &str) -> SessionResult<Option<SessionInfo>> {
        let mut sessions = self.sessions.lock();
        let Some(record) = sessions.get_mut(id) else {
            debug!(session_id = %id, "Touch on unknown session");
            return Ok(None);
        };
        record.touch()?;
        Ok(Some(record.info()))
    }

    /// Finish the handshake for a session. Unknown ids are a no-op.
    pub fn activate(&self, id: &str) -> SessionResult<Option<SessionInfo>> {
        let mut sessions = self.sessions.lock();
        let Some(record) = sessions.get_mut(id) else {
            debug!(session_id = %id, "Activate on unknown session");
            return Ok(None);
        };
        if let Err(e) = record.activate() {
            warn!(session_id = %id, error = %e, "Session activation rejected");
            return Err(e);
        }
        debug!(session_id = %id, "Session activated");
        Ok(Some(record.info()))
    }

    /// The transport requests for this session should be forwarded to.
    pub fn transport(&self, id: &str) -> Option<Arc<T>> {
        self.sessions.lock().get(id)?.transport().cloned()
    }

    /// Close and remove a session.
    ///
    /// Returns `None` when the id is unknown, which includes a second call
    /// for the same id.
    pub async fn remove(&self, id: &str, reason: CloseReason) -> Option<CloseOutcome> {
        let removed = self.sessions.lock().remove(id);
        let Some(mut record) = removed else {
            debug!(session_id = %id, "Remove on unknown session");
            return None;
        };

        info!(session_id = %id, reason = %reason, "Removing session");
        Some(release(record.close(reason)).await)
    }

    /// Put a session into the error state, then close and remove it.
    pub async fn fail(&self, id: &str, message: impl Into<String>) -> Option<CloseOutcome> {
        let removed = self.sessions.lock().remove(id);
        let mut record = removed?;

        record.fail(message);
        warn!(
            session_id = %id,
            error = record.error().unwrap_or_default(),
            "Session failed"
        );
        Some(release(record.close(CloseReason::Error)).await)
    }

    /// Sessions a client can still use (`Active` or `Idle`).
    pub fn list_active(&self) -> Vec<SessionInfo> {
        let mut sessions = self.sessions.lock();
        sessions
            .values_mut()
            .filter_map(|record| {
                record.mark_idle_if_stale();
                record.status().is_live().then(|| record.info())
            })
            .collect()
    }

    /// Flag stale sessions idle and evict everything that should go.
    ///
    /// Returns how many sessions were removed.
    pub async fn sweep(&self) -> usize {
        let (removed, releases) = {
            let mut sessions = self.sessions.lock();
            let doomed: Vec<String> = sessions
                .iter_mut()
                .filter_map(|(id, record)| {
                    record.mark_idle_if_stale();
                    record.should_evict().then(|| id.clone())
                })
                .collect();

            let releases: Vec<TransportRelease<T>> = doomed
                .iter()
                .filter_map(|id| sessions.remove(id))
                .filter_map(|mut record| {
                    let reason = match record.status() {
                        SessionStatus::Error => CloseReason::Error,
                        _ => CloseReason::IdleTimeout,
                    };
                    record.close(reason)
                })
                .collect();
            (doomed.len(), releases)
        };

        if removed > 0 {
            release_all(releases).await;
            info!(removed, "Swept idle sessions");
        }
        removed
    }

    /// Close and remove every session. Used on shutdown.
    pub async fn remove_all(&self, reason: CloseReason) -> usize {
        let records: Vec<SessionRecord<T>> = {
            let mut sessions = self.sessions.lock();
            sessions.drain().map(|(_, record)| record).collect()
        };
        let removed = records.len();
        let releases = records
            .into_iter()
            .filter_map(|mut record| record.close(reason))
            .collect();

        release_all(releases).await;
        if removed > 0 {
            info!(removed, reason = %reason, "Removed all sessions");
        }
        removed
    }

    /// Counts by state, after flagging stale sessions idle.
    pub fn stats(&self) -> SessionStats {
        let mut sessions = self.sessions.lock();
        let mut stats = SessionStats {
            total: sessions.len(),
            ..SessionStats::default()
        };
        for record in sessions.values_mut() {
            record.mark_idle_if_stale();
            match record.status() {
                SessionStatus::Active => stats.active += 1,
                SessionStatus::Idle => stats.idle += 1,
                SessionStatus::Closed => stats.closed += 1,
                SessionStatus::Initializing | SessionStatus::Error => {}
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Whether any stored session would currently be evicted by a sweep.
    pub fn has_evictable(&self) -> bool {
        self.sessions.lock().values().any(SessionRecord::should_evict)
    }
}

impl<T> std::fmt::Debug for SessionStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .field("sessions", &self.sessions.lock().len())
            .finish()
    }
}

async fn release<T: SessionTransport>(pending: Option<TransportRelease<T>>) -> CloseOutcome {
    match pending {
        Some(pending) => pending.release().await,
        None => CloseOutcome::Released,
    }
}

async fn release_all<T: SessionTransport>(releases: Vec<TransportRelease<T>>) {
    let outcomes = join_all(releases.into_iter().map(TransportRelease::release)).await;
    let failed = outcomes.iter().filter(|o| !o.is_released()).count();
    if failed > 0 {
        warn!(failed, "Some transports failed to release cleanly");
    }
}
