use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use toolrelay_core::Error;

/// Definition of a tool as reported by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// One item of tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// Result payload of a successful `tools/call`.
///
/// `is_error` marks a domain-level failure the tool chose to report as
/// content rather than as a protocol error.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<Content>,
    #[serde(
        rename = "isError",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Serialize `value` as pretty JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the value cannot be serialized.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        serde_json::to_string_pretty(value)
            .map(Self::text)
            .map_err(|e| Error::Internal(e.to_string()))
    }

    pub fn error_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// Concatenated text of every content item.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                Content::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// An asynchronous tool body.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with the caller-supplied arguments.
    async fn call(&self, arguments: Value) -> Result<ToolOutput, Error>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput, Error>> + Send + 'static,
{
    async fn call(&self, arguments: Value) -> Result<ToolOutput, Error> {
        (self)(arguments).await
    }
}

/// Decode tool arguments into a typed struct.
///
/// # Errors
///
/// Returns [`Error::InvalidArguments`] when the arguments do not match `T`.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, Error> {
    serde_json::from_value(arguments).map_err(|e| Error::InvalidArguments(e.to_string()))
}

#[derive(Clone)]
struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Name-keyed set of tools, filled once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: impl ToolHandler + 'static,
    ) -> &mut Self {
        let name = name.into();
        let definition = ToolDefinition {
            name: name.clone(),
            description: description.into(),
            input_schema,
        };
        self.tools.insert(
            name,
            RegisteredTool {
                definition,
                handler: Arc::new(handler),
            },
        );
        self
    }

    /// Return the list of tool definitions for the `tools/list` method.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|t| Arc::clone(&t.handler))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve `name` and run it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] for an unregistered name, otherwise
    /// whatever the handler returns.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput, Error> {
        let handler = self
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;
        handler.call(arguments).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" }
            },
            "required": ["text"]
        })
    }

    fn registry() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register("echo", "Echo the text back.", echo_schema(), |args: Value| async move {
            let text = args
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidArguments("missing 'text'".to_string()))?;
            Ok::<_, Error>(ToolOutput::text(text))
        });
        tools
    }

    #[tokio::test]
    async fn call_registered_tool() {
        let out = registry()
            .call("echo", serde_json::json!({ "text": "hi" }))
            .await
            .unwrap();
        assert_eq!(out.joined_text(), "hi");
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let err = registry()
            .call("missing", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let err = registry()
            .call("echo", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }

    #[test]
    fn definitions_serialize_with_input_schema() {
        let defs = registry().definitions();
        assert_eq!(defs.len(), 1);
        let json = serde_json::to_string(&defs).unwrap();
        assert!(json.contains("inputSchema"));
        assert!(json.contains("echo"));
    }

    #[test]
    fn reregistering_replaces() {
        let mut tools = registry();
        tools.register("echo", "Replaced.", echo_schema(), |_args: Value| async {
            Ok::<_, Error>(ToolOutput::text("x"))
        });
        assert_eq!(tools.len(), 1);
        assert_eq!(tools.definitions()[0].description, "Replaced.");
    }

    #[test]
    fn output_omits_is_error_when_false() {
        let json = serde_json::to_value(ToolOutput::text("5")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "content": [{ "type": "text", "text": "5" }] })
        );

        let json = serde_json::to_value(ToolOutput::error_text("bad")).unwrap();
        assert_eq!(json["isError"], true);
    }

    #[test]
    fn parse_arguments_maps_to_invalid_arguments() {
        #[derive(Deserialize)]
        struct Args {
            #[allow(dead_code)]
            a: f64,
        }
        let err = parse_arguments::<Args>(serde_json::json!({ "a": "x" })).err().unwrap();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }
}
