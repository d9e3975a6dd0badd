/// Protocol server routes exercised without binding a socket
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use browser_bridge_mcp::*;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

async fn router() -> Router {
    BrowserBridge::new(BridgeConfig::default())
        .await
        .expect("Failed to build bridge")
        .mcp_router()
}

async fn post(router: Router, body: impl Into<Body>) -> (StatusCode, Option<Value>) {
    let response = router
        .oneshot(
            Request::post("/mcp/v1/message")
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).unwrap())
    };
    (status, body)
}

async fn open_sse(router: Router) -> impl Stream<Item = Result<Bytes, axum::Error>> + Unpin {
    let response = router
        .oneshot(Request::get("/mcp/v1/sse").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.into_body().into_data_stream()
}

async fn next_chunk<S>(stream: &mut S) -> String
where
    S: Stream<Item = Result<Bytes, axum::Error>> + Unpin,
{
    let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("No SSE frame in time")
        .expect("SSE stream ended")
        .unwrap();
    String::from_utf8(chunk.to_vec()).unwrap()
}

#[cfg(test)]
mod http_route_tests {
    use super::*;

    #[tokio::test]
    async fn test_tools_list_over_http() {
        let (status, body) = post(
            router().await,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let tools = body.unwrap()["result"]["tools"].as_array().cloned().unwrap();
        assert_eq!(tools.len(), 8);

        let input_text = tools.iter().find(|t| t["name"] == "input_text").unwrap();
        assert_eq!(input_text["inputSchema"]["type"], "object");
        assert_eq!(input_text["inputSchema"]["required"], json!(["selector", "text"]));
    }

    #[tokio::test]
    async fn test_notification_gets_no_content() {
        let (status, body) = post(
            router().await,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let (status, body) = post(router().await, "{\"jsonrpc\": \"2.0\", \"id\":").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = body.unwrap();
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_request_without_method_is_invalid() {
        let (status, body) = post(router().await, json!({"jsonrpc": "2.0", "id": 9}).to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = body.unwrap();
        assert_eq!(body["error"]["code"], -32600);
        assert_eq!(body["id"], 9);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (status, body) = post(
            router().await,
            json!({"jsonrpc": "2.0", "id": "x", "method": "sampling/createMessage"}).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["error"]["code"], -32601);
        assert_eq!(body["id"], "x");
    }

    #[tokio::test]
    async fn test_health_report() {
        let response = router()
            .await
            .oneshot(Request::get("/mcp/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["is_running"], false);
        assert_eq!(health["port"], 11809);
        assert_eq!(health["clients_connected"], 0);
        assert_eq!(health["requests_processed"], 0);
        assert_eq!(health["pending_requests"], 0);
        assert_eq!(health["available_tools"], 8);
    }

    #[tokio::test]
    async fn test_sse_starts_with_connected_event() {
        let response = router()
            .await
            .oneshot(Request::get("/mcp/v1/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let mut stream = response.into_body().into_data_stream();
        let first = stream.next().await.unwrap().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.starts_with("event: connected\n"));
        assert!(first.contains("\"connected\":true"));
    }

    #[tokio::test]
    async fn test_sse_mirrors_posted_requests() {
        let bridge = BrowserBridge::new(BridgeConfig::default()).await.unwrap();
        let mut stream = open_sse(bridge.mcp_router()).await;
        assert!(next_chunk(&mut stream).await.starts_with("event: connected\n"));

        let (status, _) = post(
            bridge.mcp_router(),
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/list"}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let mirrored = loop {
            let chunk = next_chunk(&mut stream).await;
            if chunk.contains("\"type\":\"request\"") {
                break chunk;
            }
        };
        assert!(mirrored.starts_with("data: "));
        assert!(mirrored.contains("\"method\":\"tools/list\""));
        assert!(mirrored.contains("\"id\":5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sse_sends_keepalive_comments() {
        let bridge = BrowserBridge::new(BridgeConfig::default()).await.unwrap();
        let mut stream = open_sse(bridge.mcp_router()).await;
        let started = tokio::time::Instant::now();

        let first = stream.next().await.unwrap().unwrap();
        assert!(String::from_utf8_lossy(&first).starts_with("event: connected\n"));

        // Nothing is published, so the clock runs forward to the keepalive
        let idle = stream.next().await.unwrap().unwrap();
        let idle = String::from_utf8(idle.to_vec()).unwrap();
        assert!(idle.starts_with(':'));
        assert!(idle.contains("keepalive"));
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_rejected_bodies_are_still_mirrored() {
        let bridge = BrowserBridge::new(BridgeConfig::default()).await.unwrap();
        let mut feed = bridge.server().monitor().subscribe();

        let (status, _) = post(bridge.mcp_router(), json!({"jsonrpc": "2.0", "id": 9}).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        match feed.recv().await.unwrap() {
            MonitorEvent::Request { method, id, .. } => {
                assert!(method.is_none());
                assert_eq!(id, json!(9));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let (status, _) = post(bridge.mcp_router(), "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        match feed.recv().await.unwrap() {
            MonitorEvent::Request { method, id, .. } => {
                assert!(method.is_none());
                assert_eq!(id, Value::Null);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_any_origin_allowed() {
        let response = router()
            .await
            .oneshot(
                Request::get("/mcp/v1/health")
                    .header(header::ORIGIN, "chrome-extension://abcdef")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
