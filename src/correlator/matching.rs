/// Shape checks for the FIFO fallback
///
/// When a result arrives without a usable request id, the oldest pending request
/// may claim it, but only if the result looks like an answer to that request's
/// tool. This is a compatibility path for extensions that drop the echoed id. It
/// cannot tell apart two outstanding calls to the same tool, so the direct id
/// match always wins when an id is present.

use serde_json::{Map, Value};
use crate::domain::{ResultEnvelope, ToolName};

/// Decide whether an id-less result is a plausible answer for `tool`
pub fn fits_tool(tool: ToolName, envelope: &ResultEnvelope) -> bool {
    // An echoed action that names a different operation is never ours.
    if let (Some(echoed), Some(expected)) = (envelope.action(), tool.action()) {
        if echoed != expected {
            return false;
        }
    }

    // Answered locally, never pending.
    if tool.is_local() {
        return false;
    }

    let Some(result) = envelope.result_object() else {
        return false;
    };

    // A reported failure carries no tool-specific fields.
    if envelope.reports_failure() {
        return true;
    }

    match tool {
        ToolName::GetPageInfo => has_any(result, &["url", "title"]),
        ToolName::GetElementText => has_any(result, &["text", "element", "elementInfo", "content"]),
        ToolName::GetLastClickedElement => has_any(result, &["element", "elementInfo"]),
        ToolName::FindElement => has_any(result, &["found", "element", "elementInfo", "count"]),
        ToolName::ClickElement | ToolName::InputText | ToolName::SendKey => {
            result.contains_key("success")
        }
        ToolName::ListSavedSelectors => false,
    }
}

fn has_any(result: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| result.contains_key(*key))
}
