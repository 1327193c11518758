//! Host-supplied request handling and the per-session HTTP transport

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::transport::SessionTransport;

/// JSON-RPC error codes used on the MCP endpoint
pub mod codes {
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const BAD_SESSION: i64 = -32000;
    pub const SESSION_NOT_FOUND: i64 = -32001;
}

/// Error returned by a [`McpRequestHandler`]
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// The session cannot continue; it is moved to the error state and removed.
    #[error("Session failed: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn code(&self) -> i64 {
        match self {
            HandlerError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            HandlerError::InvalidParams(_) => codes::INVALID_PARAMS,
            HandlerError::Internal(_) | HandlerError::Fatal(_) => codes::INTERNAL_ERROR,
        }
    }
}

/// Application logic behind the MCP endpoint (tools, resources, ...)
///
/// `initialize`, `ping` and notifications are answered by the transport
/// itself; every other request for a live session lands here.
#[async_trait]
pub trait McpRequestHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        session_id: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, HandlerError>;
}

/// Per-session channel between the HTTP endpoint and the request handler
pub struct McpSessionTransport<H> {
    handler: Arc<H>,
    closed: AtomicBool,
}

impl<H: McpRequestHandler> McpSessionTransport<H> {
    pub fn new(handler: Arc<H>) -> Arc<Self> {
        Arc::new(Self {
            handler,
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Forward a request to the handler
    pub async fn dispatch(
        &self,
        session_id: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, HandlerError> {
        if self.is_closed() {
            return Err(HandlerError::Internal("session transport is closed".to_string()));
        }
        tracing::debug!(session_id = %session_id, method = %method, "Dispatching request");
        self.handler.handle(session_id, method, params).await
    }
}

#[async_trait]
impl<H: McpRequestHandler> SessionTransport for McpSessionTransport<H> {
    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("MCP session transport closed");
        }
        Ok(())
    }
}
