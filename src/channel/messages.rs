/// Frames exchanged with the browser extension over the socket channel
///
/// Every frame is a JSON object tagged by `type`. Only `dom_operation` and
/// `dom_operation_result` belong to the tool-call path; the rest are liveness and
/// diagnostics.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Command, ResultEnvelope};

/// Frames the bridge sends to the extension
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    DomOperation(Command),
    ConnectionEstablished { message: String, timestamp: String },
    HeartbeatResponse { timestamp: String },
    StatusResponse { status: String, connected_clients: usize, timestamp: String },
    MessageReceived { original_type: String, timestamp: String },
    Error { message: String, timestamp: String },
}

impl OutboundFrame {
    pub fn welcome() -> Self {
        OutboundFrame::ConnectionEstablished {
            message: "Connected to browser bridge".to_string(),
            timestamp: timestamp(),
        }
    }

    pub fn heartbeat_response() -> Self {
        OutboundFrame::HeartbeatResponse { timestamp: timestamp() }
    }

    pub fn status(connected_clients: usize) -> Self {
        OutboundFrame::StatusResponse {
            status: "running".to_string(),
            connected_clients,
            timestamp: timestamp(),
        }
    }

    pub fn ack(original_type: impl Into<String>) -> Self {
        OutboundFrame::MessageReceived {
            original_type: original_type.into(),
            timestamp: timestamp(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutboundFrame::Error {
            message: message.into(),
            timestamp: timestamp(),
        }
    }
}

/// Frames the extension sends to the bridge
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    DomOperationResult(ResultEnvelope),
    Heartbeat,
    StatusRequest,
    TabUpdated {
        #[serde(default)]
        url: Option<String>,
    },
    TabActivated {
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Parse a text frame, returning its `type` tag alongside the decoded frame
pub fn parse_inbound(text: &str) -> Result<(String, InboundFrame), serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let Some(kind) = value.get("type").and_then(Value::as_str).map(str::to_string) else {
        return Ok(("unknown".to_string(), InboundFrame::Unknown));
    };
    let frame = serde_json::from_value(value)?;
    Ok((kind, frame))
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
