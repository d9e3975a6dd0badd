/// The static tool catalog advertised through `tools/list`
///
/// Input schemas are derived from the same argument structs the dispatcher
/// deserializes, so what we advertise and what we accept cannot drift apart.

use schemars::{gen::SchemaGenerator, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::ToolName;
use crate::mcp::protocol::ToolDefinition;

/// Arguments for tools that target a single element
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SelectorArgs {
    /// CSS selector
    pub selector: String,
}

/// Arguments for `input_text`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InputTextArgs {
    /// CSS selector
    pub selector: String,
    /// Text to input
    pub text: String,
}

/// Arguments for `send_key`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SendKeyArgs {
    /// CSS selector
    pub selector: String,
    /// Key to send
    pub key: String,
}

/// Arguments for tools that take none
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// Immutable list of tool definitions, built once at startup
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    definitions: Vec<ToolDefinition>,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCatalog {
    pub fn new() -> Self {
        let definitions = ToolName::ALL
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.as_str().to_string(),
                description: description(*tool).to_string(),
                input_schema: input_schema(*tool),
            })
            .collect();
        Self { definitions }
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|definition| definition.name == name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn description(tool: ToolName) -> &'static str {
    match tool {
        ToolName::FindElement => "Find an element using CSS selector",
        ToolName::ClickElement => "Click an element on the page",
        ToolName::InputText => "Input text into an element",
        ToolName::GetElementText => "Get text content from an element",
        ToolName::SendKey => "Send key press to an element",
        ToolName::GetPageInfo => "Get current page information",
        ToolName::GetLastClickedElement => "Get last clicked element info",
        ToolName::ListSavedSelectors => "List all saved CSS selectors from the selector presets file",
    }
}

fn input_schema(tool: ToolName) -> Value {
    match tool {
        ToolName::FindElement | ToolName::ClickElement | ToolName::GetElementText => {
            schema_of::<SelectorArgs>()
        }
        ToolName::InputText => schema_of::<InputTextArgs>(),
        ToolName::SendKey => schema_of::<SendKeyArgs>(),
        ToolName::GetPageInfo | ToolName::GetLastClickedElement | ToolName::ListSavedSelectors => {
            schema_of::<NoArgs>()
        }
    }
}

/// JSON schema for `T` in the shape MCP clients expect
fn schema_of<T: JsonSchema>() -> Value {
    let root = SchemaGenerator::default().into_root_schema_for::<T>();
    let mut schema = serde_json::to_value(root).unwrap_or_else(|_| json!({"type": "object"}));
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object.insert("type".to_string(), json!("object"));
        object.entry("properties").or_insert_with(|| json!({}));
        object.entry("required").or_insert_with(|| json!([]));
    }
    schema
}
