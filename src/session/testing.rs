//! Test transport shared by the session unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::transport::SessionTransport;

#[derive(Default)]
pub(crate) struct MockTransport {
    closes: AtomicUsize,
    fail_close: bool,
    peer_rx: Mutex<Option<oneshot::Receiver<()>>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_close: true,
            ..Default::default()
        })
    }

    /// Transport plus the sender that simulates a peer disconnect.
    pub(crate) fn with_peer_signal() -> (Arc<Self>, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let transport = Arc::new(Self {
            peer_rx: Mutex::new(Some(rx)),
            ..Default::default()
        });
        (transport, tx)
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionTransport for MockTransport {
    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(TransportError::Other("socket already gone".to_string()));
        }
        Ok(())
    }

    fn on_close(&self) -> Option<oneshot::Receiver<()>> {
        self.peer_rx.lock().take()
    }
}
