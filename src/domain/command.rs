/// Outbound DOM commands sent to the browser extension
///
/// A Command is the only thing the bridge ever asks the extension to do. Its
/// payload fields are opaque to the bridge; only `request_id` and `source`
/// matter for correlation and routing.

use serde::{Deserialize, Serialize};
use crate::domain::{RequestId, Source, ToolName};

/// A DOM operation addressed to every connected extension client
///
/// Serialized inside the channel's `{"type": "dom_operation", ...}` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Extension action name (e.g. "click_element", "get_text")
    pub action: String,
    /// CSS selector the action targets, when the action needs one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Text to type for input actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Key name for key-press actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Correlation token, echoed back inside the result envelope
    pub request_id: RequestId,
    /// Originating caller, echoed back inside the result envelope
    pub source: Source,
}

impl Command {
    /// Start a command for the given action with a freshly minted id
    pub fn new(action: impl Into<String>, source: Source) -> Self {
        Self {
            action: action.into(),
            selector: None,
            text: None,
            key: None,
            request_id: RequestId::new(),
            source,
        }
    }

    /// Build the command a network tool sends on behalf of the protocol server
    ///
    /// Returns `None` for local tools, which never reach the channel.
    pub fn for_tool(tool: ToolName) -> Option<Self> {
        tool.action().map(|action| Self::new(action, Source::Mcp))
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Keep a caller-supplied id instead of the minted one
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }
}
