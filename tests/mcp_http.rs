use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use mcp_session_transport::mcp::{mcp_router, McpState, SESSION_ID_HEADER};
use mcp_session_transport::{
    HandlerError, McpRequestHandler, SessionConfig, SessionManager, SessionStatus,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct DashboardStub;

#[async_trait]
impl McpRequestHandler for DashboardStub {
    async fn handle(
        &self,
        session_id: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, HandlerError> {
        match method {
            "tools/list" => Ok(json!({ "tools": [{ "name": "sales_summary" }] })),
            "tools/call" => Ok(json!({ "session": session_id, "echo": params })),
            "crash" => Err(HandlerError::Fatal("database connection lost".to_string())),
            other => Err(HandlerError::MethodNotFound(other.to_string())),
        }
    }
}

type Manager = SessionManager<mcp_session_transport::McpSessionTransport<DashboardStub>>;

fn app() -> (Router, Arc<Manager>) {
    let config = SessionConfig::from_millis(1000, 200).unwrap();
    let manager = Arc::new(SessionManager::new(config).unwrap());
    let state = McpState::new(manager.clone(), Arc::new(DashboardStub), "dashboard", "0.1.0");
    (mcp_router(state), manager)
}

fn post(session: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json");
    if let Some(id) = session {
        builder = builder.header(SESSION_ID_HEADER, id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn initialize(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(post(
            None,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get(SESSION_ID_HEADER)
        .expect("session header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn initialize_creates_active_session() {
    let (app, manager) = app();

    let response = app
        .clone()
        .oneshot(post(
            None,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = response
        .headers()
        .get(SESSION_ID_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["serverInfo"]["name"], "dashboard");

    let info = manager.store().get(&id).unwrap();
    assert_eq!(info.status, SessionStatus::Active);
}

#[tokio::test]
async fn request_without_session_is_rejected() {
    let (app, manager) = app();

    let response = app
        .oneshot(post(
            None,
            json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(manager.store().is_empty());
}

#[tokio::test]
async fn unknown_session_gets_not_found() {
    let (app, _) = app();

    let response = app
        .oneshot(post(
            Some("nonexistent-id"),
            json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/list" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Session not found or expired");
}

#[tokio::test]
async fn requests_are_forwarded_to_handler() {
    let (app, _) = app();
    let id = initialize(&app).await;

    let response = app
        .clone()
        .oneshot(post(
            Some(&id),
            json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": { "name": "sales_summary" } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["result"]["session"], id.as_str());
    assert_eq!(body["result"]["echo"]["name"], "sales_summary");

    let response = app
        .clone()
        .oneshot(post(Some(&id), json!({ "jsonrpc": "2.0", "id": 5, "method": "ping" })))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["result"], json!({}));

    let response = app
        .oneshot(post(
            Some(&id),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn second_initialize_on_session_is_rejected() {
    let (app, manager) = app();
    let id = initialize(&app).await;

    let response = app
        .oneshot(post(
            Some(&id),
            json!({ "jsonrpc": "2.0", "id": 6, "method": "initialize", "params": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(manager.store().len(), 1);
}

#[tokio::test]
async fn fatal_handler_error_drops_session() {
    let (app, manager) = app();
    let id = initialize(&app).await;

    let response = app
        .clone()
        .oneshot(post(Some(&id), json!({ "jsonrpc": "2.0", "id": 7, "method": "crash" })))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32603);
    assert!(manager.store().get(&id).is_none());

    let response = app
        .oneshot(post(Some(&id), json!({ "jsonrpc": "2.0", "id": 8, "method": "ping" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_closes_session_once() {
    let (app, manager) = app();
    let id = initialize(&app).await;

    let delete = |id: &str| {
        Request::builder()
            .method("DELETE")
            .uri("/mcp")
            .header(SESSION_ID_HEADER, id)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(delete(&id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(manager.store().is_empty());

    let response = app.oneshot(delete(&id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_swept_and_rejected() {
    let (app, manager) = app();
    let id = initialize(&app).await;
    manager.start_sweeper();

    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert!(manager.store().get(&id).is_none());

    let response = app
        .oneshot(post(Some(&id), json!({ "jsonrpc": "2.0", "id": 9, "method": "tools/list" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    manager.shutdown().await;
}

#[tokio::test]
async fn debug_reports_session_stats() {
    let (app, _) = app();
    initialize(&app).await;
    initialize(&app).await;

    let response = app
        .oneshot(Request::builder().uri("/debug").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sessions"]["total"], 2);
    assert_eq!(body["sessions"]["active"], 2);
    assert_eq!(body["sessions"]["closed"], 0);
    assert_eq!(body["active_sessions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unmatched_route_returns_hint() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["received"]["path"], "/nope");
}
