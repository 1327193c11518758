//! Session lifecycle management.
//!
//! ```text
//!  request ──▶ router ──▶ SessionStore::get/touch ──▶ transport
//!                               ▲
//!                               │ sweep() every cleanup_interval
//!                          IdleSweeper
//! ```
//!
//! [`SessionManager`] owns the store and the sweeper. Sessions are created on
//! `initialize`, touched on every request, flagged idle lazily on lookup and
//! evicted by the sweeper once stale.

mod manager;
mod record;
mod store;
mod sweeper;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::SessionManager;
pub use record::{SessionRecord, TransportRelease};
pub use store::SessionStore;
pub use sweeper::IdleSweeper;
pub use types::{CloseOutcome, CloseReason, SessionInfo, SessionStats, SessionStatus};
