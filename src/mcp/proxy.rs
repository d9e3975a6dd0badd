/// Stdio proxy in front of the HTTP transport
///
/// Desktop MCP clients that only speak newline-delimited JSON-RPC over stdio
/// launch this proxy; every line read from stdin is forwarded to
/// `POST /mcp/v1/message` and the answer, if any, is written to stdout.

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::mcp::http::{HEALTH_PATH, MESSAGE_PATH};
use crate::mcp::protocol::{error_codes, JsonRpcResponse};

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("MCP server at {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("MCP server health check failed with status {0}")]
    Unhealthy(StatusCode),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Forwards stdio JSON-RPC traffic to a running bridge
pub struct StdioProxy {
    client: reqwest::Client,
    base_url: String,
}

impl StdioProxy {
    /// `base_url` is the server root, e.g. `http://localhost:11809`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProxyError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Health-check the server before accepting any input
    pub async fn connect(&self) -> Result<Value, ProxyError> {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ProxyError::Unreachable { url: url.clone(), source })?;

        if !response.status().is_success() {
            return Err(ProxyError::Unhealthy(response.status()));
        }

        let health: Value = response
            .json()
            .await
            .map_err(|source| ProxyError::Unreachable { url, source })?;
        info!(status = %health["status"], "Connected to MCP server");
        Ok(health)
    }

    /// Forward one request; `None` when the server answered 204
    pub async fn forward(&self, request: &Value) -> Option<Value> {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(Value::as_str).unwrap_or("");
        let url = format!("{}{}", self.base_url, MESSAGE_PATH);

        let response = match self.client.post(&url).json(request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                error!(method, "Request timeout");
                return Some(server_error(id, "Request timeout".to_string()));
            }
            Err(e) => {
                error!(method, error = %e, "Error sending request to server");
                return Some(server_error(id, format!("Connection error: {}", e)));
            }
        };

        match response.status() {
            StatusCode::NO_CONTENT => None,
            StatusCode::OK => match response.json::<Value>().await {
                Ok(body) => Some(body),
                Err(e) => Some(server_error(id, format!("Invalid response body: {}", e))),
            },
            status => {
                let text = response.text().await.unwrap_or_default();
                error!(method, %status, "Server returned error");
                Some(server_error(id, format!("Server error: {} - {}", status.as_u16(), text)))
            }
        }
    }

    /// Handle one stdin line, returning what to write back
    pub async fn process_line(&self, line: &str) -> Option<Value> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(request) => self.forward(&request).await,
            Err(e) => {
                error!("Invalid JSON from stdin: {}", e);
                let response =
                    JsonRpcResponse::error(Value::Null, error_codes::PARSE_ERROR, "Parse error".to_string(), None);
                serde_json::to_value(response).ok()
            }
        }
    }

    /// Pump `input` lines through the server until EOF
    pub async fn pump<R, W>(&self, input: R, mut output: W) -> Result<(), ProxyError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(response) = self.process_line(&line).await {
                let response_str = serde_json::to_string(&response)?;

                // Write response + newline
                output.write_all(response_str.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;

                debug!("Sent response: {}", response_str);
            }
        }
        info!("Proxy shutting down (stdin closed)");
        Ok(())
    }

    /// Run over the process's stdin and stdout
    pub async fn run(&self) -> Result<(), ProxyError> {
        self.connect().await?;
        self.pump(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

fn server_error(id: Value, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": error_codes::SERVER_ERROR.code(), "message": message}
    })
}
