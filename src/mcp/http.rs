/// HTTP transport for the MCP server
///
/// `POST /mcp/v1/message` carries one JSON-RPC request per body,
/// `GET /mcp/v1/sse` streams the monitoring feed and `GET /mcp/v1/health`
/// reports status. Any origin may call in.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::mcp::protocol::{error_codes, JsonRpcRequest, JsonRpcResponse};
use crate::mcp::{McpServer, MonitorEvent};

pub const MESSAGE_PATH: &str = "/mcp/v1/message";
pub const SSE_PATH: &str = "/mcp/v1/sse";
pub const HEALTH_PATH: &str = "/mcp/v1/health";

/// Routes for the protocol server
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route(MESSAGE_PATH, post(handle_message))
        .route(SSE_PATH, get(handle_sse))
        .route(HEALTH_PATH, get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(server)
}

async fn handle_message(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse JSON-RPC body: {}", e);
            server.monitor().publish(MonitorEvent::unparsed(&Value::Null));
            return rejection(error_codes::PARSE_ERROR, "Parse error".to_string(), Value::Null);
        }
    };

    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(e) => {
            warn!("Body is not a JSON-RPC request: {}", e);
            server.monitor().publish(MonitorEvent::unparsed(&id));
            return rejection(error_codes::INVALID_REQUEST, format!("Invalid Request: {}", e), id);
        }
    };

    match server.handle_request(request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

fn rejection(code: jsonrpc_core::ErrorCode, message: String, id: Value) -> Response {
    let response = JsonRpcResponse::error(id, code, message, None);
    (StatusCode::BAD_REQUEST, Json(response)).into_response()
}

async fn handle_sse(State(server): State<Arc<McpServer>>) -> impl IntoResponse {
    server.monitor().sse(server.settings().sse_keepalive)
}

async fn handle_health(State(server): State<Arc<McpServer>>) -> impl IntoResponse {
    Json(server.health().await)
}
