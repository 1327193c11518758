//! Owner of the session store and its idle sweeper.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::info;

use super::store::SessionStore;
use super::sweeper::IdleSweeper;
use super::types::{CloseReason, SessionInfo};
use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::transport::SessionTransport;

/// Session manager for one host process.
///
/// Construct it during startup, hand [`SessionManager::store`] to whatever
/// routes requests, and call [`SessionManager::shutdown`] before exiting. The
/// sweeper only runs once [`SessionManager::start_sweeper`] is called.
pub struct SessionManager<T> {
    store: Arc<SessionStore<T>>,
    sweeper: Mutex<Option<IdleSweeper>>,
}

impl<T: SessionTransport> SessionManager<T> {
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        Ok(Self {
            store: Arc::new(SessionStore::new(config)?),
            sweeper: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<SessionStore<T>> {
        &self.store
    }

    /// Create a session for `transport` and follow its peer-close signal.
    ///
    /// Must be called from within a Tokio runtime when the transport reports
    /// peer disconnects.
    pub fn open(&self, transport: Arc<T>) -> SessionResult<SessionInfo> {
        let peer_closed = transport.on_close();
        let info = self.store.create_default(transport)?;
        if let Some(signal) = peer_closed {
            watch_peer(Arc::downgrade(&self.store), info.id.clone(), signal);
        }
        Ok(info)
    }

    /// Start the idle sweeper. Returns false if one is already running.
    pub fn start_sweeper(&self) -> bool {
        let mut sweeper = self.sweeper.lock();
        if sweeper.as_ref().is_some_and(IdleSweeper::is_running) {
            return false;
        }
        let period = self.store.config().cleanup_interval;
        *sweeper = Some(IdleSweeper::spawn(self.store.clone(), period));
        info!(?period, "Idle sweeper started");
        true
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.lock().as_ref().is_some_and(IdleSweeper::is_running)
    }

    pub async fn stop_sweeper(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
            info!("Idle sweeper stopped");
        }
    }

    /// Stop the sweeper and release every session. Returns how many were closed.
    pub async fn shutdown(&self) -> usize {
        self.stop_sweeper().await;
        let closed = self.store.remove_all(CloseReason::Shutdown).await;
        info!(closed, "Session manager shut down");
        closed
    }
}

impl<T> std::fmt::Debug for SessionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.store)
            .field("sweeper", &*self.sweeper.lock())
            .finish()
    }
}

fn watch_peer<T: SessionTransport>(
    store: Weak<SessionStore<T>>,
    session_id: String,
    signal: oneshot::Receiver<()>,
) {
    tokio::spawn(async move {
        // A dropped sender means the transport went away without a disconnect.
        if signal.await.is_err() {
            return;
        }
        let Some(store) = store.upgrade() else {
            return;
        };
        if store
            .remove(&session_id, CloseReason::PeerDisconnected)
            .await
            .is_some()
        {
            info!(session_id = %session_id, "Peer disconnected, session removed");
        }
    });
}
