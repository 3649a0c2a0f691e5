//! Tool-call execution helper
//!
//! The library never runs tools on its own. Callers who want the common loop
//! register handlers in a [`ToolRegistry`] and turn a response's tool calls
//! into tool-result messages with [`execute_tool`] or [`execute_tools`].
//!
//! ```
//! use serde_json::json;
//! use unillm_core::tools::{execute_tool, ToolArgs, ToolRegistry};
//! use unillm_core::protocol::ToolCall;
//!
//! let mut registry = ToolRegistry::new();
//! registry.register("add", |args: ToolArgs| -> anyhow::Result<serde_json::Value> {
//!     let a: i64 = args.get_as("a")?;
//!     let b: i64 = args.get_as("b")?;
//!     Ok(json!(a + b))
//! });
//!
//! let call = ToolCall::new("call_1", "add", json!({"a": 2, "b": 3}));
//! let message = execute_tool(&call, &registry).unwrap();
//! assert_eq!(message.text(), "5");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::protocol::{Message, Response, Tool, ToolCall};
use crate::providers::error::{ProviderError, ProviderResult};

/// A callable that answers one tool
pub trait ToolHandler: Send + Sync {
    /// Run the tool with the call's arguments
    fn call(&self, args: ToolArgs) -> anyhow::Result<Value>;
}

impl<F> ToolHandler for F
where
    F: Fn(ToolArgs) -> anyhow::Result<Value> + Send + Sync,
{
    fn call(&self, args: ToolArgs) -> anyhow::Result<Value> {
        self(args)
    }
}

/// Arguments handed to a tool handler
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    /// Wrap parsed call arguments; anything but an object is an error
    pub fn from_value(value: &Value) -> anyhow::Result<Self> {
        match value {
            Value::Object(values) => Ok(Self {
                values: values.clone(),
            }),
            Value::Null => Ok(Self::default()),
            other => Err(anyhow!("tool arguments must be a JSON object, got {}", other)),
        }
    }

    /// Argument by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Required argument, deserialized
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| anyhow!("missing argument '{}'", name))?;
        serde_json::from_value(value.clone()).with_context(|| format!("invalid argument '{}'", name))
    }

    /// All arguments, deserialized into one struct
    pub fn deserialize<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_value(Value::Object(self.values.clone())).context("invalid tool arguments")
    }

    /// Values in the tool's declared parameter order; absent ones are `Null`
    pub fn positional(&self, tool: &Tool) -> Vec<Value> {
        tool.parameter_names()
            .iter()
            .map(|name| self.values.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the call carried no arguments
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Tool name to handler mapping
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the handler for `name`
    pub fn register(&mut self, name: impl Into<String>, handler: impl ToolHandler + 'static) -> &mut Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Builder form of [`ToolRegistry::register`]
    pub fn with(mut self, name: impl Into<String>, handler: impl ToolHandler + 'static) -> Self {
        self.register(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Run one tool call and package the outcome as a tool-result message
///
/// Only an unregistered tool name is an `Err`. Malformed arguments, handler
/// errors and panics become a result whose content starts with `Error:`.
pub fn execute_tool(call: &ToolCall, registry: &ToolRegistry) -> ProviderResult<Message> {
    let handler = registry
        .get(&call.tool_name)
        .ok_or_else(|| ProviderError::UnknownTool(call.tool_name.clone()))?;

    let output = match run_handler(handler.as_ref(), call) {
        Ok(value) => {
            debug!(tool = %call.tool_name, call_id = %call.call_id, "Tool call succeeded");
            stringify(value)
        }
        Err(e) => {
            warn!(tool = %call.tool_name, call_id = %call.call_id, error = %e, "Tool call failed");
            format!("Error: {:#}", e)
        }
    };

    Ok(call.to_result_message(output))
}

/// Run every tool call of a response in order
pub fn execute_tools(response: &Response, registry: &ToolRegistry) -> ProviderResult<Vec<Message>> {
    response
        .tool_calls
        .iter()
        .map(|call| execute_tool(call, registry))
        .collect()
}

fn run_handler(handler: &dyn ToolHandler, call: &ToolCall) -> anyhow::Result<Value> {
    let arguments = call.arguments().map_err(|e| anyhow!(e.clone()))?;
    let args = ToolArgs::from_value(arguments)?;

    match catch_unwind(AssertUnwindSafe(|| handler.call(args))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow!("tool panicked: {}", message))
        }
    }
}

/// JSON strings are used as-is, everything else is serialized
fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FinishReason, MessageRole};
    use serde::Deserialize;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with("get_weather", |args: ToolArgs| -> anyhow::Result<Value> {
                let city: String = args.get_as("city")?;
                Ok(json!(format!("Sunny in {}", city)))
            })
            .with("forecast", |_args: ToolArgs| -> anyhow::Result<Value> { Ok(json!({"high": 31, "low": 19})) })
            .with("fails", |_args: ToolArgs| -> anyhow::Result<Value> { Err(anyhow!("service unavailable")) })
            .with("panics", |_args: ToolArgs| -> anyhow::Result<Value> { panic!("boom") })
    }

    #[test]
    fn test_string_result_is_unquoted() {
        let call = ToolCall::new("call_1", "get_weather", json!({"city": "Rome"}));
        let message = execute_tool(&call, &registry()).unwrap();

        assert_eq!(message.role, MessageRole::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(message.name.as_deref(), Some("get_weather"));
        assert_eq!(message.text(), "Sunny in Rome");
    }

    #[test]
    fn test_structured_result_is_serialized() {
        let call = ToolCall::new("call_2", "forecast", json!({}));
        let message = execute_tool(&call, &registry()).unwrap();
        assert_eq!(message.text(), r#"{"high":31,"low":19}"#);
    }

    #[test]
    fn test_unknown_tool_is_an_error() {
        let call = ToolCall::new("call_3", "delete_everything", json!({}));
        let err = execute_tool(&call, &registry()).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownTool(ref name) if name == "delete_everything"));
    }

    #[test]
    fn test_handler_error_is_packaged() {
        let call = ToolCall::new("call_4", "fails", json!({}));
        let message = execute_tool(&call, &registry()).unwrap();
        assert_eq!(message.text(), "Error: service unavailable");
        assert_eq!(message.tool_call_id.as_deref(), Some("call_4"));
    }

    #[test]
    fn test_panic_is_packaged() {
        let call = ToolCall::new("call_5", "panics", json!({}));
        let message = execute_tool(&call, &registry()).unwrap();
        assert!(message.text().starts_with("Error: tool panicked: boom"));
    }

    #[test]
    fn test_missing_argument_is_packaged() {
        let call = ToolCall::new("call_6", "get_weather", json!({}));
        let message = execute_tool(&call, &registry()).unwrap();
        assert_eq!(message.text(), "Error: missing argument 'city'");
    }

    #[test]
    fn test_malformed_arguments_are_packaged() {
        let call = ToolCall::from_raw_arguments("call_7", "get_weather", r#"{"city": "Ro"#);
        let message = execute_tool(&call, &registry()).unwrap();
        assert!(message.text().starts_with("Error: malformed arguments for tool call 'call_7'"));
    }

    #[test]
    fn test_positional_follows_declared_order() {
        let tool = Tool::new(
            "divide",
            "",
            json!({"type": "object", "properties": {"dividend": {}, "divisor": {}}}),
        );
        let args = ToolArgs::from_value(&json!({"divisor": 4, "dividend": 12})).unwrap();
        assert_eq!(args.positional(&tool), vec![json!(12), json!(4)]);
    }

    #[test]
    fn test_deserialize_into_struct() {
        #[derive(Deserialize)]
        struct Query {
            city: String,
            days: u8,
        }
        let args = ToolArgs::from_value(&json!({"city": "Oslo", "days": 3})).unwrap();
        let query: Query = args.deserialize().unwrap();
        assert_eq!(query.city, "Oslo");
        assert_eq!(query.days, 3);
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        assert!(ToolArgs::from_value(&json!([1, 2])).is_err());
        assert!(ToolArgs::from_value(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_execute_tools_preserves_order() {
        let response = Response {
            content: String::new(),
            tool_calls: vec![
                ToolCall::new("call_a", "forecast", json!({})),
                ToolCall::new("call_b", "get_weather", json!({"city": "Lima"})),
            ],
            finish_reason: FinishReason::ToolCalls,
            usage: None,
            original: Value::Null,
            vendor_response_id: None,
            provider: "test".into(),
            complete: true,
        };
        let messages = execute_tools(&response, &registry()).unwrap();
        let ids: Vec<_> = messages.iter().filter_map(|m| m.tool_call_id.as_deref()).collect();
        assert_eq!(ids, vec!["call_a", "call_b"]);
    }
}
