//! MCP HTTP server setup

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use rmcp::model::{Implementation, ServerCapabilities, ServerInfo};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::McpHttpConfig;
use crate::mcp::handler::{codes, HandlerError, McpRequestHandler, McpSessionTransport};
use crate::session::{CloseReason, SessionManager, SessionStore};

/// Header carrying the session id on every request after `initialize`
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

type Sessions<H> = SessionManager<McpSessionTransport<H>>;

/// Shared state behind the MCP routes
pub struct McpState<H> {
    sessions: Arc<Sessions<H>>,
    handler: Arc<H>,
    server_info: Value,
}

impl<H> Clone for McpState<H> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            handler: self.handler.clone(),
            server_info: self.server_info.clone(),
        }
    }
}

impl<H: McpRequestHandler> McpState<H> {
    pub fn new(sessions: Arc<Sessions<H>>, handler: Arc<H>, name: &str, version: &str) -> Self {
        Self {
            sessions,
            handler,
            server_info: server_info(name, version),
        }
    }

    fn store(&self) -> &SessionStore<McpSessionTransport<H>> {
        self.sessions.store()
    }
}

fn server_info(name: &str, version: &str) -> Value {
    let mut implementation = Implementation::from_build_env();
    implementation.name = name.to_string();
    implementation.version = version.to_string();

    let mut info = ServerInfo::default();
    info.capabilities = ServerCapabilities::builder().enable_tools().build();
    info.server_info = implementation;
    info.instructions = Some(format!(
        "Send 'initialize' first and echo the {SESSION_ID_HEADER} header on every later request."
    ));

    serde_json::to_value(&info).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize server info");
        json!({})
    })
}

fn rpc_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message.into() }
    })
}

fn error_response(status: StatusCode, id: Value, code: i64, message: &str) -> Response {
    (status, Json(rpc_error(id, code, message))).into_response()
}

fn session_not_found(id: Value) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        id,
        codes::SESSION_NOT_FOUND,
        "Session not found or expired",
    )
}

fn header_session_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_ID_HEADER).and_then(|v| v.to_str().ok())
}

/// Middleware to log all incoming HTTP requests
async fn log_request_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let session = request
        .headers()
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %uri,
        session_id = %session,
        status = response.status().as_u16(),
        "MCP HTTP request"
    );
    response
}

/// Fallback handler for unmatched routes
async fn fallback_handler(request: Request) -> impl IntoResponse {
    let method = request.method().clone();
    let uri = request.uri().clone();
    tracing::warn!(%method, %uri, "Unmatched request");

    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Route not found",
            "received": {
                "method": method.as_str(),
                "uri": uri.to_string(),
                "path": uri.path(),
            },
            "hint": "MCP endpoint is at /mcp. Send 'initialize' request first.",
            "available_endpoints": ["/mcp", "/debug"]
        })),
    )
}

/// Debug endpoint that returns server info and session counts
async fn debug_handler<H: McpRequestHandler>(State(state): State<McpState<H>>) -> impl IntoResponse {
    tracing::debug!("Debug endpoint hit");

    Json(json!({
        "server": state.server_info.get("serverInfo").cloned().unwrap_or(Value::Null),
        "mcp_endpoint": "/mcp",
        "sessions": state.store().stats(),
        "active_sessions": state.store().list_active(),
        "sweeper_running": state.sessions.is_sweeping(),
    }))
}

async fn post_mcp<H: McpRequestHandler>(
    State(state): State<McpState<H>>,
    headers: HeaderMap,
    Json(message): Json<Value>,
) -> Response {
    let Some(method) = message.get("method").and_then(Value::as_str) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            Value::Null,
            codes::INVALID_REQUEST,
            "Invalid Request: expected a single JSON-RPC message with a method",
        );
    };
    // Notifications carry no id.
    let request_id = message.get("id").cloned();
    let reply_id = request_id.clone().unwrap_or(Value::Null);
    let params = message.get("params").cloned();

    let Some(session_id) = header_session_id(&headers) else {
        if method == "initialize" {
            return initialize(&state, reply_id);
        }
        return error_response(
            StatusCode::BAD_REQUEST,
            reply_id,
            codes::BAD_SESSION,
            "Bad Request: No valid session ID provided",
        );
    };

    if method == "initialize" {
        return error_response(
            StatusCode::BAD_REQUEST,
            reply_id,
            codes::INVALID_REQUEST,
            "Invalid Request: Server already initialized",
        );
    }

    match state.store().touch(session_id) {
        Ok(Some(_)) => {}
        Ok(None) => return session_not_found(reply_id),
        Err(e) => {
            tracing::debug!(session_id = %session_id, error = %e, "Request on dead session");
            return session_not_found(reply_id);
        }
    }
    let Some(transport) = state.store().transport(session_id) else {
        return session_not_found(reply_id);
    };

    if request_id.is_none() {
        tracing::debug!(session_id = %session_id, method = %method, "Notification accepted");
        return StatusCode::ACCEPTED.into_response();
    }

    if method == "ping" {
        return Json(rpc_result(reply_id, json!({}))).into_response();
    }

    match transport.dispatch(session_id, method, params).await {
        Ok(result) => Json(rpc_result(reply_id, result)).into_response(),
        Err(e) => {
            if let HandlerError::Fatal(reason) = &e {
                state.store().fail(session_id, reason.clone()).await;
            }
            Json(rpc_error(reply_id, e.code(), e.to_string())).into_response()
        }
    }
}

fn initialize<H: McpRequestHandler>(state: &McpState<H>, reply_id: Value) -> Response {
    let transport = McpSessionTransport::new(state.handler.clone());
    let created = state
        .sessions
        .open(transport)
        .and_then(|info| state.store().activate(&info.id).map(|_| info));

    let info = match created {
        Ok(info) => info,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create MCP session");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                reply_id,
                codes::INTERNAL_ERROR,
                &e.to_string(),
            );
        }
    };

    let mut response = Json(rpc_result(reply_id, state.server_info.clone())).into_response();
    match HeaderValue::from_str(&info.id) {
        Ok(value) => {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
        Err(e) => tracing::error!(error = %e, "Session id is not a valid header value"),
    }
    tracing::info!(session_id = %info.id, "MCP session initialized");
    response
}

async fn delete_mcp<H: McpRequestHandler>(
    State(state): State<McpState<H>>,
    headers: HeaderMap,
) -> Response {
    let Some(session_id) = header_session_id(&headers) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            Value::Null,
            codes::BAD_SESSION,
            "Bad Request: No valid session ID provided",
        );
    };

    match state
        .store()
        .remove(session_id, CloseReason::ClientRequested)
        .await
    {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => session_not_found(Value::Null),
    }
}

/// Build the MCP router: `/mcp` (POST, DELETE), `/debug` and a JSON fallback
pub fn mcp_router<H: McpRequestHandler>(state: McpState<H>) -> Router {
    Router::new()
        .route("/mcp", post(post_mcp::<H>).delete(delete_mcp::<H>))
        .route("/debug", any(debug_handler::<H>))
        .fallback(fallback_handler)
        .layer(middleware::from_fn(log_request_middleware))
        .with_state(state)
}

/// Running MCP HTTP server
pub struct McpHttpServer<H> {
    sessions: Arc<Sessions<H>>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<std::result::Result<(), std::io::Error>>,
}

impl<H: McpRequestHandler> McpHttpServer<H> {
    pub fn sessions(&self) -> &Arc<Sessions<H>> {
        &self.sessions
    }

    /// Stop accepting requests, stop the sweeper and release every session
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        let served = self.handle.await;
        let closed = self.sessions.shutdown().await;
        tracing::info!(closed, "MCP HTTP server stopped");
        served??;
        Ok(())
    }
}

/// Serve the MCP HTTP endpoint for a request handler
///
/// Binds `config.addr`, starts the idle sweeper and spawns the server task.
/// Call [`McpHttpServer::shutdown`] before the process exits.
pub async fn serve_mcp_http<H: McpRequestHandler>(
    handler: Arc<H>,
    config: McpHttpConfig,
) -> Result<McpHttpServer<H>> {
    tracing::info!("Starting MCP HTTP transport at http://{}/mcp", config.addr);

    let sessions = Arc::new(SessionManager::new(config.session)?);
    let state = McpState::new(
        sessions.clone(),
        handler,
        &config.server_name,
        &config.server_version,
    );
    let app = mcp_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    sessions.start_sweeper();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    Ok(McpHttpServer {
        sessions,
        shutdown_tx,
        handle,
    })
}
