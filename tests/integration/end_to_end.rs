/// Full round trips over loopback: HTTP client, bridge, WebSocket extension
use browser_bridge_mcp::*;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

struct Running {
    mcp_addr: SocketAddr,
    channel_addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl Running {
    async fn start() -> Self {
        let config = BridgeConfig {
            request_timeout_secs: 5,
            ..BridgeConfig::default()
        };
        let bridge = BrowserBridge::new(config).await.expect("Failed to build bridge");

        let mcp_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let channel_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mcp_addr = mcp_listener.local_addr().unwrap();
        let channel_addr = channel_listener.local_addr().unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            bridge
                .serve(mcp_listener, channel_listener, async {
                    let _ = stopped.await;
                })
                .await
                .expect("Bridge failed");
        });

        Self {
            mcp_addr,
            channel_addr,
            stop,
            task,
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.mcp_addr)
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("Bridge did not shut down")
            .unwrap();
    }
}

async fn next_frame<S>(socket: &mut S, kind: &str) -> Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("No frame from bridge")
            .expect("Socket closed")
            .expect("Socket error");
        if let Message::Text(text) = message {
            let frame: Value = serde_json::from_str(&text).unwrap();
            if frame["type"] == kind {
                return frame;
            }
        }
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::*;

    #[tokio::test]
    async fn test_tool_call_through_websocket_extension() {
        let bridge = Running::start().await;
        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", bridge.channel_addr))
            .await
            .expect("Failed to connect extension socket");

        let welcome = next_frame(&mut socket, "connection_established").await;
        assert!(welcome["timestamp"].is_string());

        let client = reqwest::Client::new();
        let url = format!("{}/mcp/v1/message", bridge.base_url());
        let call = tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({
                    "jsonrpc": "2.0", "id": 7, "method": "tools/call",
                    "params": {"name": "get_page_info", "arguments": {}}
                }))
                .send()
                .await
                .unwrap()
                .json::<Value>()
                .await
                .unwrap()
        });

        let command = next_frame(&mut socket, "dom_operation").await;
        assert_eq!(command["action"], "get_page_info");

        let reply = json!({
            "type": "dom_operation_result",
            "command": command,
            "result": {"success": true, "url": "https://example.test/", "title": "Example Domain"}
        });
        socket.send(Message::Text(reply.to_string())).await.unwrap();

        let ack = next_frame(&mut socket, "message_received").await;
        assert_eq!(ack["original_type"], "dom_operation_result");

        let response = call.await.unwrap();
        assert_eq!(response["id"], 7);
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Example Domain"));

        socket.close(None).await.unwrap();
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_socket_control_frames() {
        let bridge = Running::start().await;
        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}", bridge.channel_addr))
            .await
            .unwrap();
        next_frame(&mut socket, "connection_established").await;

        socket
            .send(Message::Text(json!({"type": "status_request"}).to_string()))
            .await
            .unwrap();
        let status = next_frame(&mut socket, "status_response").await;
        assert_eq!(status["status"], "running");
        assert_eq!(status["connected_clients"], 1);

        socket.send(Message::Text("not json".into())).await.unwrap();
        let error = next_frame(&mut socket, "error").await;
        assert!(error["message"].as_str().unwrap().contains("Invalid message"));

        socket.close(None).await.unwrap();
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_ends_open_sse_streams() {
        let bridge = Running::start().await;
        let mut response = reqwest::get(format!("{}/mcp/v1/sse", bridge.base_url()))
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), response.chunk())
            .await
            .expect("No connected event")
            .unwrap()
            .expect("Stream ended before the connected event");
        assert!(String::from_utf8_lossy(&first).contains("connected"));

        let started = std::time::Instant::now();
        bridge.shutdown().await;
        assert!(started.elapsed() < SHUTDOWN_GRACE);

        let rest = tokio::time::timeout(Duration::from_secs(5), response.chunk())
            .await
            .expect("Stream still open after shutdown");
        assert!(rest.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stdio_proxy_forwards_lines() {
        let bridge = Running::start().await;
        let proxy = StdioProxy::new(bridge.base_url(), Duration::from_secs(10)).unwrap();

        let health = proxy.connect().await.unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["is_running"], true);

        let input = concat!(
            r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}"#,
            "\n",
            r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#,
            "\n",
            "garbage\n",
            r#"{"jsonrpc": "2.0", "id": 2, "method": "tools/list"}"#,
            "\n",
        );
        let mut output = Vec::new();
        proxy.pump(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        // Notification produced no line
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["result"]["serverInfo"]["name"], "browser-bridge-mcp");
        assert_eq!(lines[1]["error"]["code"], -32700);
        assert_eq!(lines[2]["result"]["tools"].as_array().unwrap().len(), 8);

        bridge.shutdown().await;
    }
}
