/// Shared helpers: a bridge without sockets and an in-process extension client
use browser_bridge_mcp::channel::ClientConnection;
use browser_bridge_mcp::*;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub async fn bridge_with(timeout_secs: u64, selectors_file: Option<PathBuf>) -> BrowserBridge {
    let config = BridgeConfig {
        request_timeout_secs: timeout_secs,
        selectors_file: Some(
            selectors_file.unwrap_or_else(|| PathBuf::from("/nonexistent/saved_selectors.json")),
        ),
        ..BridgeConfig::default()
    };
    BrowserBridge::new(config).await.expect("Failed to build bridge")
}

/// Issue `tools/call` in the background, like an HTTP handler would
pub fn call_tool(server: &Arc<McpServer>, id: i64, name: &str, arguments: Value) -> JoinHandle<Value> {
    let server = server.clone();
    let request = serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    }))
    .expect("Invalid request");

    tokio::spawn(async move {
        let response = server.handle_request(request).await.expect("tools/call got no response");
        serde_json::to_value(response).expect("Failed to serialize response")
    })
}

/// Next `dom_operation` frame sent to the client, skipping control frames
pub async fn next_command(connection: &mut ClientConnection) -> Value {
    loop {
        let text = connection.outbound.recv().await.expect("Channel closed");
        let frame: Value = serde_json::from_str(&text).expect("Outbound frame is not JSON");
        if frame["type"] == "dom_operation" {
            return frame;
        }
    }
}

/// What the extension sends back for `command`
pub fn result_frame(command: &Value, result: Value) -> String {
    json!({
        "type": "dom_operation_result",
        "command": command,
        "result": result,
        "timestamp": 1_700_000_000_000u64,
    })
    .to_string()
}

pub fn content_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"]
        .as_str()
        .expect("Response has no text content")
}

pub fn is_error(response: &Value) -> bool {
    response["result"]["isError"] == true
}
