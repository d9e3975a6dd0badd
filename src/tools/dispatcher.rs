/// Tool dispatcher bridging a synchronous tool call onto the async channel
///
/// A call builds a command, registers it with the correlator, broadcasts it and
/// then waits on the correlator until the matching result shows up or the
/// timeout elapses. The selector listing is the one tool answered locally.

use chrono::{DateTime, Local, TimeZone};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::channel::CommandChannel;
use crate::correlator::{Correlator, CorrelatorError};
use crate::domain::{Command, ToolName};
use crate::tools::catalog::{InputTextArgs, NoArgs, SelectorArgs, SendKeyArgs};
use crate::tools::selectors::SelectorStore;
use crate::tools::shaping::shape_result;
use crate::tools::DispatchError;

/// Counters reported by the health endpoint
#[derive(Debug, Default)]
pub struct DispatchStats {
    requests_processed: AtomicU64,
    last_activity_ms: AtomicI64,
}

impl DispatchStats {
    fn record(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
        self.last_activity_ms
            .store(Local::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn requests_processed(&self) -> u64 {
        self.requests_processed.load(Ordering::Relaxed)
    }

    /// When the last tool call arrived, if any has
    pub fn last_activity(&self) -> Option<DateTime<Local>> {
        match self.last_activity_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Local.timestamp_millis_opt(ms).single(),
        }
    }
}

/// Executes tool calls on behalf of the protocol server
#[derive(Clone)]
pub struct ToolDispatcher {
    channel: CommandChannel,
    correlator: Correlator,
    selectors: SelectorStore,
    stats: Arc<DispatchStats>,
}

impl ToolDispatcher {
    pub fn new(channel: CommandChannel, correlator: Correlator, selectors: SelectorStore) -> Self {
        Self {
            channel,
            correlator,
            selectors,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    /// Run `tool_name` with `arguments`, waiting at most `timeout` for the extension
    pub async fn call(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value, DispatchError> {
        self.stats.record();
        let tool = ToolName::from_name(tool_name)
            .ok_or_else(|| DispatchError::UnknownTool(tool_name.to_string()))?;

        let Some(command) = build_command(tool, arguments)? else {
            return self.call_local(tool);
        };

        let id = command.request_id.clone();
        info!(tool = %tool, request_id = %id.short(), "Dispatching tool call");

        let started = Instant::now();
        let waiter = self.correlator.register(id.clone(), tool).await?;
        self.correlator.mark_sent(&id);

        if !self.channel.broadcast(&command).await {
            warn!(tool = %tool, request_id = %id.short(), "No extension clients to receive command");
            return Err(DispatchError::NoClients);
        }

        match waiter.wait(timeout).await {
            Ok(envelope) => {
                info!(tool = %tool, request_id = %id.short(), elapsed = ?started.elapsed(), "Tool result received");
                shape_result(tool, envelope)
            }
            Err(CorrelatorError::Timeout { .. }) => {
                let elapsed = started.elapsed();
                warn!(tool = %tool, request_id = %id.short(), ?elapsed, "Tool call timed out");
                Err(DispatchError::Timeout { tool, elapsed })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn call_local(&self, tool: ToolName) -> Result<Value, DispatchError> {
        match tool {
            ToolName::ListSavedSelectors => {
                let listing = self.selectors.load()?;
                info!(count = listing.selectors.len(), "Listed saved selectors locally");
                serde_json::to_value(listing).map_err(|e| DispatchError::ToolFailed {
                    tool,
                    message: e.to_string(),
                })
            }
            other => Err(DispatchError::ToolFailed {
                tool: other,
                message: "Tool has no local implementation".to_string(),
            }),
        }
    }
}

/// Build the command for a network tool, or `None` for a local one
fn build_command(
    tool: ToolName,
    arguments: Map<String, Value>,
) -> Result<Option<Command>, DispatchError> {
    let Some(command) = Command::for_tool(tool) else {
        return Ok(None);
    };
    let arguments = Value::Object(arguments);

    let command = match tool {
        ToolName::FindElement | ToolName::ClickElement | ToolName::GetElementText => {
            let args: SelectorArgs = parse_args(tool, arguments)?;
            command.with_selector(args.selector)
        }
        ToolName::InputText => {
            let args: InputTextArgs = parse_args(tool, arguments)?;
            command.with_selector(args.selector).with_text(args.text)
        }
        ToolName::SendKey => {
            let args: SendKeyArgs = parse_args(tool, arguments)?;
            command.with_selector(args.selector).with_key(args.key)
        }
        ToolName::GetPageInfo | ToolName::GetLastClickedElement | ToolName::ListSavedSelectors => {
            let _: NoArgs = parse_args(tool, arguments)?;
            command
        }
    };
    Ok(Some(command))
}

fn parse_args<T: DeserializeOwned>(tool: ToolName, arguments: Value) -> Result<T, DispatchError> {
    serde_json::from_value(arguments).map_err(|e| DispatchError::InvalidArguments {
        tool,
        message: e.to_string(),
    })
}
