//! Per-session transport contract
//!
//! A transport is the communication channel a session talks through. The
//! session layer owns it for the lifetime of the session and releases it
//! exactly once when the session is closed.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::TransportError;

/// Communication channel owned by a session
#[async_trait]
pub trait SessionTransport: Send + Sync + 'static {
    /// Release the transport. Must be idempotent.
    async fn close(&self) -> Result<(), TransportError>;

    /// Signal fired when the remote peer disconnects on its own.
    ///
    /// The session layer treats the signal as an explicit removal. Returning
    /// `None` means the transport has no way to report peer disconnects.
    /// The receiver is taken once, when the session is opened.
    fn on_close(&self) -> Option<oneshot::Receiver<()>> {
        None
    }
}
