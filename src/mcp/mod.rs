/// MCP protocol implementation
///
/// This module handles the Model Context Protocol communication,
/// including JSON-RPC parsing, tool routing, the HTTP transport with its
/// monitoring stream, and the stdio proxy for clients that only speak stdio.

pub mod http;
pub mod monitor;
pub mod protocol;
pub mod proxy;
pub mod server;

// Re-export main types
pub use http::router;
pub use monitor::{Monitor, MonitorEvent};
pub use proxy::{ProxyError, StdioProxy};
pub use server::{HealthReport, McpServer, ServerSettings};
