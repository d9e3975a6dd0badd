/// Core identifiers and closed enumerations shared by both transports
///
/// This module defines RequestId, Source and ToolName. Everything that used to be
/// a free-form string on the wire and drives routing is parsed into one of these.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier correlating a command with its eventual result
///
/// Ids minted here are UUID v4 strings, but ids echoed back by the extension are
/// accepted as arbitrary strings so a foreign sender's ids still match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Mint a fresh, globally unique request id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an id received from the wire; empty strings carry no identity
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in log lines
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which caller originated a command
///
/// The tag travels inside the command and is echoed back by the extension so the
/// result can be routed to the caller that is waiting for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The interactive control surface operated by a human
    Ui,
    /// The protocol server acting for an AI client
    Mcp,
}

impl Source {
    /// Look up a source tag; unknown tags yield `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "ui" => Some(Source::Ui),
            "mcp" => Some(Source::Mcp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Ui => "ui",
            Source::Mcp => "mcp",
        }
    }
}

/// The fixed tool catalog
///
/// Every tool except `ListSavedSelectors` is executed by the browser extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    FindElement,
    ClickElement,
    InputText,
    GetElementText,
    SendKey,
    GetPageInfo,
    GetLastClickedElement,
    ListSavedSelectors,
}

impl ToolName {
    /// All tools in catalog order
    pub const ALL: [ToolName; 8] = [
        ToolName::FindElement,
        ToolName::ClickElement,
        ToolName::InputText,
        ToolName::GetElementText,
        ToolName::SendKey,
        ToolName::GetPageInfo,
        ToolName::GetLastClickedElement,
        ToolName::ListSavedSelectors,
    ];

    /// Resolve a protocol-level tool name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tool| tool.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::FindElement => "find_element",
            ToolName::ClickElement => "click_element",
            ToolName::InputText => "input_text",
            ToolName::GetElementText => "get_element_text",
            ToolName::SendKey => "send_key",
            ToolName::GetPageInfo => "get_page_info",
            ToolName::GetLastClickedElement => "get_last_clicked_element",
            ToolName::ListSavedSelectors => "list_saved_selectors",
        }
    }

    /// The extension action this tool maps to, or `None` for local tools
    pub fn action(&self) -> Option<&'static str> {
        match self {
            ToolName::FindElement => Some("find_element"),
            ToolName::ClickElement => Some("click_element"),
            ToolName::InputText => Some("input_text"),
            ToolName::GetElementText => Some("get_text"),
            ToolName::SendKey => Some("send_key"),
            ToolName::GetPageInfo => Some("get_page_info"),
            ToolName::GetLastClickedElement => Some("get_last_clicked_element"),
            ToolName::ListSavedSelectors => None,
        }
    }

    /// Whether the tool answers from local state without a channel round trip
    pub fn is_local(&self) -> bool {
        self.action().is_none()
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
