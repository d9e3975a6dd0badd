/// MCP tools for browser automation
///
/// This module contains the tool catalog that external clients (like Claude)
/// discover through `tools/list`, and the dispatcher that executes `tools/call`
/// by sending commands to the browser extension.

pub mod catalog;
pub mod dispatcher;
pub mod selectors;
pub mod shaping;

// Re-export tool types for easy access
pub use catalog::*;
pub use dispatcher::*;
pub use selectors::*;
pub use shaping::*;

use std::time::Duration;
use thiserror::Error;

use crate::correlator::CorrelatorError;
use crate::domain::ToolName;

/// Errors a tool call can end with
///
/// Only `UnknownTool` is a protocol-level failure; every other variant is
/// reported to the client as tool content marked `isError`.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: ToolName, message: String },

    #[error("No extension clients connected")]
    NoClients,

    #[error("Request timeout - {tool} got no response from the extension within {elapsed:.1?}")]
    Timeout { tool: ToolName, elapsed: Duration },

    #[error("{message}")]
    ToolFailed { tool: ToolName, message: String },

    #[error(transparent)]
    Selectors(#[from] SelectorError),

    #[error("Request tracking failed: {0}")]
    Correlator(#[from] CorrelatorError),
}
