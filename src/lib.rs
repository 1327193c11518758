//! MCP session transport - session lifecycle for an MCP HTTP endpoint
//!
//! Sessions are created on `initialize`, tracked by id, flagged idle when
//! unused for longer than `max_idle_time` and evicted by a periodic sweeper.
//! The host application plugs its tools in through [`McpRequestHandler`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use mcp_session_transport::{serve_mcp_http, HandlerError, McpHttpConfig, McpRequestHandler};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! struct Dashboard;
//!
//! #[async_trait::async_trait]
//! impl McpRequestHandler for Dashboard {
//!     async fn handle(&self, _session: &str, method: &str, _params: Option<Value>) -> Result<Value, HandlerError> {
//!         Err(HandlerError::MethodNotFound(method.to_string()))
//!     }
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = serve_mcp_http(Arc::new(Dashboard), McpHttpConfig::new(8889)).await?;
//! tokio::signal::ctrl_c().await?;
//! server.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mcp;
pub mod session;
pub mod transport;

// Re-export main API
pub use config::{McpHttpConfig, SessionConfig};
pub use error::{SessionError, SessionResult, TransportError};
pub use mcp::{serve_mcp_http, HandlerError, McpHttpServer, McpRequestHandler, McpSessionTransport};
pub use session::{
    CloseOutcome, CloseReason, IdleSweeper, SessionInfo, SessionManager, SessionStats,
    SessionStatus, SessionStore,
};
pub use transport::SessionTransport;
