//! MCP (Model Context Protocol) HTTP transport
//!
//! Provides the `/mcp` JSON-RPC endpoint with session tracking.

pub mod handler;
pub mod server;

pub use handler::{HandlerError, McpRequestHandler, McpSessionTransport};
pub use server::{mcp_router, serve_mcp_http, McpHttpServer, McpState, SESSION_ID_HEADER};
