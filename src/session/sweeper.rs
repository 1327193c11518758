//! Periodic idle sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::store::SessionStore;
use crate::transport::SessionTransport;

/// Handle to a running sweeper task.
///
/// Dropping the handle also stops the task (the stop channel closes), but
/// [`IdleSweeper::stop`] is the way to wait for it to finish.
pub struct IdleSweeper {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl IdleSweeper {
    /// Spawn a task that sweeps `store` every `period`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<T: SessionTransport>(store: Arc<SessionStore<T>>, period: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.sweep().await;
                        if removed > 0 {
                            info!(removed, remaining = store.len(), "Idle sweep evicted sessions");
                        } else {
                            debug!(remaining = store.len(), "Idle sweep found nothing to evict");
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("Idle sweeper stopped");
        });

        Self { stop_tx, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the task to stop and wait for it.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Idle sweeper task ended abnormally");
        }
    }
}

impl std::fmt::Debug for IdleSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleSweeper")
            .field("running", &self.is_running())
            .finish()
    }
}
