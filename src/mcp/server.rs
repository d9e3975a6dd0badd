/// MCP server implementation that handles JSON-RPC requests
///
/// This module implements the method surface the HTTP transport exposes:
/// 1. Mirrors every request onto the monitoring feed
/// 2. Answers `initialize`, `tools/list` and the empty listings itself
/// 3. Hands `tools/call` to the dispatcher and formats its outcome

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::mcp::monitor::{Monitor, MonitorEvent};
use crate::mcp::protocol::*;
use crate::tools::{render_success, DispatchError, ToolCatalog, ToolDispatcher};

/// Where the server listens and how long it lets tool calls run
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub sse_keepalive: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11809,
            request_timeout: Duration::from_secs(30),
            sse_keepalive: Duration::from_secs(30),
        }
    }
}

/// Body of `GET /mcp/v1/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub is_running: bool,
    pub protocol: &'static str,
    pub host: String,
    pub port: u16,
    /// Monitoring stream subscribers
    pub clients_connected: usize,
    pub extension_clients: usize,
    pub requests_processed: u64,
    pub pending_requests: usize,
    pub available_tools: usize,
    pub last_activity: Option<String>,
}

/// MCP server that handles communication with Claude
pub struct McpServer {
    dispatcher: ToolDispatcher,
    catalog: ToolCatalog,
    monitor: Monitor,
    settings: ServerSettings,
    is_running: AtomicBool,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(dispatcher: ToolDispatcher, monitor: Monitor, settings: ServerSettings) -> Self {
        Self {
            dispatcher,
            catalog: ToolCatalog::new(),
            monitor,
            settings,
            is_running: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn set_running(&self, running: bool) {
        self.is_running.store(running, Ordering::Relaxed);
    }

    /// Handle a JSON-RPC request
    ///
    /// Returns `None` for notifications, which get no response body.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, id = %request.id, "Processing request");
        self.monitor
            .publish(MonitorEvent::request(&request.method, &request.id));

        if request.is_notification() {
            debug!(method = %request.method, "Notification acknowledged");
            return None;
        }

        let method = request.method.clone();
        let id = request.id.clone();

        let response = if !request.has_supported_version() {
            warn!(method = %request.method, version = ?request.jsonrpc, "Unsupported JSON-RPC version");
            JsonRpcResponse::error(
                request.id,
                error_codes::INVALID_REQUEST,
                format!("Invalid Request: jsonrpc must be \"{}\"", JSONRPC_VERSION),
                None,
            )
        } else {
            self.dispatch_method(request).await
        };

        let is_error = response.is_error()
            || response
                .result
                .as_ref()
                .and_then(|result| result.get("isError"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
        self.monitor
            .publish(MonitorEvent::response(&method, &id, is_error));

        Some(response)
    }

    async fn dispatch_method(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            "resources/list" => JsonRpcResponse::success(request.id, json!({"resources": []})),
            "prompts/list" => JsonRpcResponse::success(request.id, json!({"prompts": []})),
            _ => {
                warn!(method = %request.method, "Unknown method");
                JsonRpcResponse::error(
                    request.id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                    None,
                )
            }
        }
    }

    /// Handle MCP initialization request
    fn handle_initialize(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        info!("MCP client connected");

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        to_response(request.id, &result)
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(count = self.catalog.len(), "Listing tools");
        JsonRpcResponse::success(request.id, json!({"tools": self.catalog.definitions()}))
    }

    /// Handle tools/call request
    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: ToolCallParams = match request.params {
            Some(params) => match serde_json::from_value(params) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(
                        request.id,
                        error_codes::INVALID_PARAMS,
                        format!("Invalid tool call parameters: {}", e),
                        None,
                    );
                }
            },
            None => {
                return JsonRpcResponse::error(
                    request.id,
                    error_codes::INVALID_PARAMS,
                    "Missing tool call parameters".to_string(),
                    None,
                );
            }
        };

        info!(tool = %params.name, "Calling tool");

        let outcome = self
            .dispatcher
            .call(&params.name, params.arguments, self.settings.request_timeout)
            .await;

        let result = match outcome {
            Ok(payload) => ToolCallResult::success(render_success(&payload)),
            Err(DispatchError::UnknownTool(name)) => {
                return JsonRpcResponse::error(
                    request.id,
                    error_codes::INVALID_PARAMS,
                    format!("Unknown tool: {}", name),
                    None,
                );
            }
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call failed");
                ToolCallResult::error(e.to_string())
            }
        };

        to_response(request.id, &result)
    }

    /// Current status for the health endpoint
    pub async fn health(&self) -> HealthReport {
        let stats = self.dispatcher.stats();
        HealthReport {
            status: "healthy",
            is_running: self.is_running.load(Ordering::Relaxed),
            protocol: "http",
            host: self.settings.host.clone(),
            port: self.settings.port,
            clients_connected: self.monitor.subscriber_count(),
            extension_clients: self.dispatcher.channel().client_count().await,
            requests_processed: stats.requests_processed(),
            pending_requests: self.dispatcher.correlator().pending_count().await,
            available_tools: self.catalog.len(),
            last_activity: stats.last_activity().map(|at| at.to_rfc3339()),
        }
    }
}

fn to_response<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            id,
            error_codes::INTERNAL_ERROR,
            format!("Failed to serialize result: {}", e),
            None,
        ),
    }
}
