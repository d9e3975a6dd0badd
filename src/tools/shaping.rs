/// Reshaping raw extension results into each tool's response contract

use serde_json::{json, Map, Value};

use crate::domain::{ResultEnvelope, ToolName};
use crate::tools::DispatchError;

/// Turn a matched result envelope into the tool's response payload
///
/// A result reporting `success: false` becomes a `ToolFailed` error carrying the
/// extension's message.
pub fn shape_result(tool: ToolName, envelope: ResultEnvelope) -> Result<Value, DispatchError> {
    let Value::Object(fields) = envelope.result else {
        return Err(DispatchError::ToolFailed {
            tool,
            message: "Invalid response format from extension".to_string(),
        });
    };

    if fields.get("success") == Some(&Value::Bool(false)) {
        let message = fields
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        return Err(DispatchError::ToolFailed { tool, message });
    }

    match tool {
        ToolName::GetElementText => Ok(element_text(fields)),
        _ => Ok(Value::Object(fields)),
    }
}

/// `get_element_text` always surfaces a top-level `text`
fn element_text(fields: Map<String, Value>) -> Value {
    let element_info = fields
        .get("elementInfo")
        .or_else(|| fields.get("element"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    let text = fields
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| fields.get("content").and_then(Value::as_str))
        .or_else(|| non_empty_str(&element_info, "innerText"))
        .or_else(|| non_empty_str(&element_info, "textContent"))
        .or_else(|| element_info.get("text").and_then(Value::as_str))
        .unwrap_or("")
        .to_string();

    json!({
        "success": true,
        "text": text,
        "element_info": element_info,
    })
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Render a successful payload as the text of a tool-call content block
pub fn render_success(payload: &Value) -> String {
    let rendered = match payload {
        Value::Object(fields) => {
            let trimmed: Map<String, Value> = fields
                .iter()
                .filter(|(key, _)| key.as_str() != "success")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            if trimmed.is_empty() {
                serde_json::to_string_pretty(payload)
            } else {
                serde_json::to_string_pretty(&Value::Object(trimmed))
            }
        }
        other => serde_json::to_string_pretty(other),
    };
    rendered.unwrap_or_else(|_| payload.to_string())
}
