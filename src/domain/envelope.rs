/// Inbound result envelopes produced by the browser extension
///
/// The extension answers a command with
/// `{"type": "dom_operation_result", "command": <echo>, "result": {...}, "timestamp": ...}`.
/// The echoed command is the only place the correlation id and source tag survive
/// the round trip, so it is parsed leniently: a missing or malformed echo just
/// means the result carries no usable id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::domain::{RequestId, Source};

/// The command as echoed back by the extension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandEcho {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Any other echoed fields (selector, text, ...)
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A `dom_operation_result` frame minus its type tag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandEcho>,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl ResultEnvelope {
    /// Build an envelope answering a known request (used by tests and fakes)
    pub fn answering(request_id: &RequestId, source: Source, result: Value) -> Self {
        Self {
            command: Some(CommandEcho {
                request_id: Some(request_id.to_string()),
                source: Some(source.as_str().to_string()),
                action: None,
                rest: Map::new(),
            }),
            result,
            timestamp: None,
        }
    }

    /// The echoed correlation id, if it is present and non-empty
    pub fn request_id(&self) -> Option<RequestId> {
        self.command
            .as_ref()
            .and_then(|echo| echo.request_id.as_deref())
            .and_then(RequestId::parse)
    }

    /// The echoed source tag, if it is one we know
    pub fn source(&self) -> Option<Source> {
        self.command
            .as_ref()
            .and_then(|echo| echo.source.as_deref())
            .and_then(Source::from_tag)
    }

    /// The echoed extension action, if any
    pub fn action(&self) -> Option<&str> {
        self.command.as_ref().and_then(|echo| echo.action.as_deref())
    }

    /// The result payload when it is a JSON object
    pub fn result_object(&self) -> Option<&Map<String, Value>> {
        self.result.as_object()
    }

    /// Whether the extension explicitly reported failure
    pub fn reports_failure(&self) -> bool {
        self.result
            .get("success")
            .and_then(Value::as_bool)
            .map(|success| !success)
            .unwrap_or(false)
    }
}
