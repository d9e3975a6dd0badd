/// Tool calls end to end through the server, the channel and the correlator
use super::common::*;
use browser_bridge_mcp::{BridgeConfig, BridgeError, BrowserBridge};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[cfg(test)]
mod dispatch_tests {
    use super::*;

    #[tokio::test]
    async fn test_click_round_trip() {
        let bridge = bridge_with(5, None).await;
        let mut extension = bridge.channel().connect().await;

        let call = call_tool(bridge.server(), 1, "click_element", json!({"selector": "#submit"}));

        let command = next_command(&mut extension).await;
        assert_eq!(command["action"], "click_element");
        assert_eq!(command["selector"], "#submit");
        assert_eq!(command["source"], "mcp");
        assert!(command["request_id"].as_str().is_some_and(|id| !id.is_empty()));

        bridge
            .channel()
            .handle_inbound(
                extension.id,
                &result_frame(&command, json!({"success": true, "message": "Clicked #submit"})),
            )
            .await;

        let response = call.await.unwrap();
        assert_eq!(response["id"], 1);
        assert!(!is_error(&response));
        assert!(content_text(&response).contains("Clicked #submit"));
        assert!(!content_text(&response).contains("success"));
        assert_eq!(bridge.server().health().await.pending_requests, 0);
    }

    #[tokio::test]
    async fn test_no_clients_fails_fast() {
        let bridge = bridge_with(30, None).await;

        let response = tokio::time::timeout(
            Duration::from_secs(1),
            call_tool(bridge.server(), 2, "get_page_info", json!({})),
        )
        .await
        .expect("Call without clients should not wait for the timeout")
        .unwrap();

        assert!(is_error(&response));
        assert_eq!(content_text(&response), "Error: No extension clients connected");
        assert_eq!(bridge.server().health().await.pending_requests, 0);
    }

    #[tokio::test]
    async fn test_out_of_order_results_reach_their_callers() {
        let bridge = bridge_with(5, None).await;
        let mut extension = bridge.channel().connect().await;

        let alpha = call_tool(bridge.server(), 10, "get_element_text", json!({"selector": "#alpha"}));
        let first = next_command(&mut extension).await;
        let beta = call_tool(bridge.server(), 11, "get_element_text", json!({"selector": "#beta"}));
        let second = next_command(&mut extension).await;

        assert_eq!(first["action"], "get_text");
        assert_ne!(first["request_id"], second["request_id"]);

        // Answer the later command first
        for command in [&second, &first] {
            let text = if command["selector"] == "#alpha" { "Alpha" } else { "Beta" };
            bridge
                .channel()
                .handle_inbound(extension.id, &result_frame(command, json!({"success": true, "text": text})))
                .await;
        }

        let alpha = alpha.await.unwrap();
        let beta = beta.await.unwrap();
        assert!(content_text(&alpha).contains("Alpha"));
        assert!(content_text(&beta).contains("Beta"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_result_is_discarded() {
        let bridge = bridge_with(2, None).await;
        let mut extension = bridge.channel().connect().await;

        let call = call_tool(bridge.server(), 3, "find_element", json!({"selector": "#slow"}));
        let command = next_command(&mut extension).await;

        let response = call.await.unwrap();
        assert!(is_error(&response));
        assert!(content_text(&response).starts_with("Error: Request timeout"));
        assert_eq!(bridge.server().health().await.pending_requests, 0);

        // The late result finds nobody waiting and changes nothing
        bridge
            .channel()
            .handle_inbound(extension.id, &result_frame(&command, json!({"success": true, "found": true})))
            .await;
        assert_eq!(bridge.server().health().await.pending_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_timeout_outlasts_default_sweep_window() {
        let config = BridgeConfig {
            request_timeout_secs: 90,
            stale_after_secs: 120,
            selectors_file: None,
            ..BridgeConfig::default()
        };
        let bridge = BrowserBridge::new(config).await.expect("Failed to build bridge");
        let mut extension = bridge.channel().connect().await;

        let started = tokio::time::Instant::now();
        let call = call_tool(bridge.server(), 4, "get_page_info", json!({}));
        next_command(&mut extension).await;

        // Several sweeps pass while the caller waits; none may evict it
        let response = call.await.unwrap();
        assert!(is_error(&response));
        assert!(content_text(&response).starts_with("Error: Request timeout"));
        assert!(started.elapsed() >= Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_timeout_at_or_past_stale_threshold_is_rejected() {
        let config = BridgeConfig {
            request_timeout_secs: 120,
            ..BridgeConfig::default()
        };
        assert!(matches!(
            BrowserBridge::new(config).await,
            Err(BridgeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_extension_failure_is_error_content() {
        let bridge = bridge_with(5, None).await;
        let mut extension = bridge.channel().connect().await;

        let call = call_tool(bridge.server(), 4, "input_text", json!({"selector": "#q", "text": "rust"}));
        let command = next_command(&mut extension).await;
        assert_eq!(command["text"], "rust");

        bridge
            .channel()
            .handle_inbound(
                extension.id,
                &result_frame(&command, json!({"success": false, "error": "Element not found: #q"})),
            )
            .await;

        let response = call.await.unwrap();
        assert!(is_error(&response));
        assert_eq!(content_text(&response), "Error: Element not found: #q");
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_extension() {
        let bridge = bridge_with(5, None).await;
        let mut extension = bridge.channel().connect().await;

        let response = call_tool(bridge.server(), 5, "send_key", json!({"selector": "#q"}))
            .await
            .unwrap();

        assert!(is_error(&response));
        assert!(content_text(&response).contains("Invalid arguments for send_key"));
        assert!(extension.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_saved_selectors_need_no_extension() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r##"[{{"name": "Login button", "selector": "#login", "action": "click", "usage_count": 2}}]"##
        )
        .unwrap();
        let bridge = bridge_with(5, Some(file.path().to_path_buf())).await;

        let response = call_tool(bridge.server(), 6, "list_saved_selectors", json!({}))
            .await
            .unwrap();

        assert!(!is_error(&response));
        let listing: serde_json::Value = serde_json::from_str(content_text(&response)).unwrap();
        assert_eq!(listing["selectors"][0]["name"], "Login button");
        assert_eq!(listing["message"], "Saved selectors loaded successfully");
        assert!(listing.get("success").is_none());
    }

    #[tokio::test]
    async fn test_missing_selector_file_is_tool_error() {
        let bridge = bridge_with(5, None).await;

        let response = call_tool(bridge.server(), 7, "list_saved_selectors", json!({}))
            .await
            .unwrap();

        assert!(is_error(&response));
        assert!(content_text(&response).contains("not found"));
    }
}
