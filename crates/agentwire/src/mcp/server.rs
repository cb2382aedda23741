//! In-process tool server and tool builder

use crate::mcp::protocol::{
    error_response, success_response, JsonRpcRequest, ERROR_INTERNAL, ERROR_INVALID_PARAMS,
    ERROR_INVALID_REQUEST, ERROR_METHOD_NOT_FOUND,
};
use crate::mcp::schema::validate_arguments;
use agentwire_protocol::ContentBlock;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Protocol version answered to `initialize`
const PROTOCOL_VERSION: &str = "0.1.0";

/// Errors a tool handler can raise
///
/// A handler failure becomes a JSON-RPC internal error; tool-level failures
/// (bad input the tool itself detects, division by zero) should instead be
/// returned as [`ToolResult::error`], which reaches the model as an
/// `isError` result rather than a protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The input could not be used.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The handler failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

/// The result of a tool invocation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolResult {
    /// Result content blocks.
    pub content: Vec<ContentBlock>,

    /// Whether the result represents a tool-level failure.
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    /// A successful text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    /// A tool-level error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
        }
    }

    /// A successful result from explicit blocks
    pub fn blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }
}

/// Context handed to a tool handler
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Cancellation signal; honored handlers stop early when it fires.
    pub signal: CancellationToken,
}

/// A tool hosted by an in-process server
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Unique name within the server.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON schema for the tool arguments (`type: "object"`).
    fn input_schema(&self) -> &Value;

    /// Run the tool with validated arguments.
    async fn call(&self, ctx: ToolContext, args: Map<String, Value>)
        -> Result<ToolResult, ToolError>;
}

type Handler = Arc<
    dyn Fn(ToolContext, Map<String, Value>) -> BoxFuture<'static, Result<ToolResult, ToolError>>
        + Send
        + Sync,
>;

/// A tool backed by an async closure
pub struct FunctionTool {
    name: String,
    description: String,
    input_schema: Value,
    handler: Handler,
}

#[async_trait]
impl McpTool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    async fn call(
        &self,
        ctx: ToolContext,
        args: Map<String, Value>,
    ) -> Result<ToolResult, ToolError> {
        (self.handler)(ctx, args).await
    }
}

/// Fluent builder for function tools
///
/// Parameter declarations compile down to the tool's JSON schema.
pub struct ToolBuilder {
    name: String,
    description: String,
    properties: Map<String, Value>,
    required: Vec<String>,
    handler: Option<Handler>,
}

impl ToolBuilder {
    /// Start building a tool
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            properties: Map::new(),
            required: Vec::new(),
            handler: None,
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn param(mut self, name: &str, param_type: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            serde_json::json!({"type": param_type, "description": description}),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Declare a string parameter
    pub fn string_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(name, "string", description, required)
    }

    /// Declare a number parameter
    pub fn number_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(name, "number", description, required)
    }

    /// Declare an integer parameter
    pub fn int_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(name, "integer", description, required)
    }

    /// Declare a boolean parameter
    pub fn bool_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(name, "boolean", description, required)
    }

    /// Declare an array parameter
    pub fn array_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(name, "array", description, required)
    }

    /// Declare a string parameter constrained to an enum
    pub fn enum_param(
        mut self,
        name: &str,
        description: &str,
        required: bool,
        values: &[&str],
    ) -> Self {
        self.properties.insert(
            name.to_string(),
            serde_json::json!({
                "type": "string",
                "description": description,
                "enum": values,
            }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Declare an object parameter with an explicit nested schema
    pub fn object_param(
        mut self,
        name: &str,
        description: &str,
        required: bool,
        schema: Value,
    ) -> Self {
        let mut prop = schema;
        if let Some(obj) = prop.as_object_mut() {
            obj.insert("type".into(), "object".into());
            obj.insert("description".into(), description.into());
        }
        self.properties.insert(name.to_string(), prop);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Set the handler
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ToolContext, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult, ToolError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |ctx, args| handler(ctx, args).boxed()));
        self
    }

    /// Build the tool
    pub fn build(self) -> Result<FunctionTool, crate::error::AgentError> {
        if self.name.is_empty() {
            return Err(crate::error::AgentError::Config(
                "tool name is required".into(),
            ));
        }
        if self.description.is_empty() {
            return Err(crate::error::AgentError::Config(format!(
                "tool {} needs a description",
                self.name
            )));
        }
        let handler = self.handler.ok_or_else(|| {
            crate::error::AgentError::Config(format!("tool {} needs a handler", self.name))
        })?;

        Ok(FunctionTool {
            name: self.name,
            description: self.description,
            input_schema: serde_json::json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
            handler,
        })
    }
}

/// An in-process MCP server
///
/// Immutable identity, thread-safe tool registry: `add`/`remove` take the
/// write lock, `list` and message handling read a snapshot.
pub struct ToolServer {
    name: String,
    version: String,
    tools: RwLock<HashMap<String, Arc<dyn McpTool>>>,
}

impl std::fmt::Debug for ToolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServer")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish()
    }
}

impl ToolServer {
    /// Create an empty server
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool at construction time
    pub fn with_tool(self, tool: FunctionTool) -> Result<Self, crate::error::AgentError> {
        {
            let mut tools = self.tools.try_write().expect("unshared at construction");
            let name = tool.name().to_string();
            if tools.contains_key(&name) {
                return Err(crate::error::AgentError::Config(format!(
                    "tool already exists: {name}"
                )));
            }
            tools.insert(name, Arc::new(tool));
        }
        Ok(self)
    }

    /// The server name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The server version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Register a tool; fails if the name is taken
    pub async fn add_tool(&self, tool: Arc<dyn McpTool>) -> Result<(), crate::error::AgentError> {
        let mut tools = self.tools.write().await;
        let name = tool.name().to_string();
        if tools.contains_key(&name) {
            return Err(crate::error::AgentError::Config(format!(
                "tool already exists: {name}"
            )));
        }
        tools.insert(name, tool);
        Ok(())
    }

    /// Remove a tool by name; fails if absent
    pub async fn remove_tool(&self, name: &str) -> Result<(), crate::error::AgentError> {
        let mut tools = self.tools.write().await;
        if tools.remove(name).is_none() {
            return Err(crate::error::AgentError::Config(format!(
                "tool not found: {name}"
            )));
        }
        Ok(())
    }

    /// Snapshot of registered tool names
    pub async fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Handle one JSON-RPC message and produce the response object
    pub async fn handle_message(&self, message: Value) -> Value {
        let raw_id = message.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                return error_response(raw_id, ERROR_INVALID_REQUEST, format!(
                    "not a JSON-RPC request: {e}"
                ));
            }
        };

        let id = request.id.clone();
        match request.method.as_str() {
            "initialize" => success_response(
                id,
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": self.name, "version": self.version},
                }),
            ),
            "tools/list" => {
                let tools = self.tools.read().await;
                let mut listed: Vec<Value> = tools
                    .values()
                    .map(|tool| {
                        serde_json::json!({
                            "name": tool.name(),
                            "description": tool.description(),
                            "inputSchema": tool.input_schema(),
                        })
                    })
                    .collect();
                listed.sort_by(|a, b| {
                    a["name"]
                        .as_str()
                        .unwrap_or_default()
                        .cmp(b["name"].as_str().unwrap_or_default())
                });
                success_response(id, serde_json::json!({"tools": listed}))
            }
            "tools/call" => self.handle_tool_call(id, request.params).await,
            other => {
                error_response(id, ERROR_METHOD_NOT_FOUND, format!("method not found: {other}"))
            }
        }
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> Value {
        let Some(params) = params.as_ref().and_then(Value::as_object) else {
            return error_response(id, ERROR_INVALID_PARAMS, "missing or invalid params");
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return error_response(id, ERROR_INVALID_PARAMS, "missing or invalid tool name");
        };
        let Some(arguments) = params.get("arguments").and_then(Value::as_object) else {
            return error_response(id, ERROR_INVALID_PARAMS, "missing or invalid arguments");
        };

        let tool = {
            let tools = self.tools.read().await;
            tools.get(name).cloned()
        };
        let Some(tool) = tool else {
            return error_response(id, ERROR_METHOD_NOT_FOUND, format!("tool not found: {name}"));
        };

        if let Err(violation) = validate_arguments(tool.input_schema(), arguments) {
            return error_response(id, ERROR_INVALID_PARAMS, violation.to_string());
        }

        let ctx = ToolContext::default();
        let call = tool.call(ctx, arguments.clone());
        match std::panic::AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(result)) => {
                // Re-serialize through the generic encoder so blocks reach
                // the protocol as plain maps.
                let result = serde_json::to_value(&result)
                    .unwrap_or_else(|_| serde_json::json!({"content": [], "isError": true}));
                success_response(id, result)
            }
            Ok(Err(e)) => {
                error_response(id, ERROR_INTERNAL, format!("tool execution failed: {e}"))
            }
            Err(_) => {
                warn!(tool = name, "tool handler panicked");
                error_response(id, ERROR_INTERNAL, format!("tool handler panicked: {name}"))
            }
        }
    }
}

/// How a tool name routes through the `mcp__<server>__<tool>` convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoute<'a> {
    /// Whether the name addresses an MCP server.
    pub is_mcp: bool,
    /// Server segment; empty for non-MCP names.
    pub server: &'a str,
    /// Tool segment.
    pub tool: &'a str,
}

/// Split a tool name along the `mcp__<server>__<tool>` convention
///
/// Tool names may themselves contain `__`; only the first two separators
/// after the `mcp` prefix are structural.
pub fn route_tool_name(name: &str) -> ToolRoute<'_> {
    if let Some(rest) = name.strip_prefix("mcp__") {
        if let Some((server, tool)) = rest.split_once("__") {
            if !server.is_empty() && !tool.is_empty() {
                return ToolRoute {
                    is_mcp: true,
                    server,
                    tool,
                };
            }
        }
    }
    ToolRoute {
        is_mcp: false,
        server: "",
        tool: name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn calculator() -> ToolServer {
        let add = ToolBuilder::new("add")
            .description("Add two numbers")
            .number_param("a", "First number", true)
            .number_param("b", "Second number", true)
            .handler(|_ctx, args| async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(ToolResult::text(format!("{}", a + b)))
            })
            .build()
            .unwrap();

        let divide = ToolBuilder::new("divide")
            .description("Divide first number by second")
            .number_param("a", "Dividend", true)
            .number_param("b", "Divisor", true)
            .handler(|_ctx, args| async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                if b == 0.0 {
                    return Ok(ToolResult::error("division by zero"));
                }
                Ok(ToolResult::text(format!("{}", a / b)))
            })
            .build()
            .unwrap();

        ToolServer::new("calc", "1.0.0")
            .with_tool(add)
            .unwrap()
            .with_tool(divide)
            .unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let server = calculator();
        let response = server
            .handle_message(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
            .await;
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], "calc");
        assert_eq!(
            response["result"]["capabilities"]["tools"]["listChanged"],
            false
        );
    }

    #[tokio::test]
    async fn tools_list_snapshot() {
        let server = calculator();
        let response = server
            .handle_message(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
            .await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "add");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn tools_call_happy_path() {
        let server = calculator();
        let response = server
            .handle_message(json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tools/call",
                "params": {"name": "add", "arguments": {"a": 2.5, "b": 3.5}}
            }))
            .await;
        assert_eq!(response["id"], 7);
        assert_eq!(response["result"]["isError"], false);
        assert_eq!(response["result"]["content"][0]["type"], "text");
        assert_eq!(response["result"]["content"][0]["text"], "6");
    }

    #[tokio::test]
    async fn division_by_zero_is_tool_error_not_rpc_error() {
        let server = calculator();
        let response = server
            .handle_message(json!({
                "jsonrpc": "2.0",
                "id": 8,
                "method": "tools/call",
                "params": {"name": "divide", "arguments": {"a": 1.0, "b": 0.0}}
            }))
            .await;
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(response["result"]["content"][0]["text"], "division by zero");
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected_before_the_handler() {
        let server = calculator();
        let response = server
            .handle_message(json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": {"name": "add", "arguments": {"a": "two", "b": 3.0}}
            }))
            .await;
        assert_eq!(response["error"]["code"], ERROR_INVALID_PARAMS);
        assert!(response["error"]["message"].as_str().unwrap().contains("a"));
    }

    #[tokio::test]
    async fn unknown_tool_and_unknown_method() {
        let server = calculator();
        let response = server
            .handle_message(json!({
                "jsonrpc": "2.0",
                "id": 10,
                "method": "tools/call",
                "params": {"name": "modulo", "arguments": {}}
            }))
            .await;
        assert_eq!(response["error"]["code"], ERROR_METHOD_NOT_FOUND);

        let response = server
            .handle_message(json!({"jsonrpc": "2.0", "id": 11, "method": "resources/list"}))
            .await;
        assert_eq!(response["error"]["code"], ERROR_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn handler_error_is_internal() {
        let failing = ToolBuilder::new("failing")
            .description("always fails")
            .handler(|_ctx, _args| async move {
                Err::<ToolResult, _>(ToolError::ExecutionFailed("intentional".into()))
            })
            .build()
            .unwrap();
        let server = ToolServer::new("t", "0.1.0").with_tool(failing).unwrap();
        let response = server
            .handle_message(json!({
                "jsonrpc": "2.0",
                "id": 12,
                "method": "tools/call",
                "params": {"name": "failing", "arguments": {}}
            }))
            .await;
        assert_eq!(response["error"]["code"], ERROR_INTERNAL);
    }

    #[tokio::test]
    async fn handler_panic_is_internal() {
        let panicking = ToolBuilder::new("panicking")
            .description("panics")
            .handler(|_ctx, _args| async move {
                panic!("boom");
                #[allow(unreachable_code)]
                Ok(ToolResult::text("unreachable"))
            })
            .build()
            .unwrap();
        let server = ToolServer::new("t", "0.1.0").with_tool(panicking).unwrap();
        let response = server
            .handle_message(json!({
                "jsonrpc": "2.0",
                "id": 13,
                "method": "tools/call",
                "params": {"name": "panicking", "arguments": {}}
            }))
            .await;
        assert_eq!(response["error"]["code"], ERROR_INTERNAL);
    }

    #[tokio::test]
    async fn direct_call_and_rpc_call_agree() {
        let server = calculator();
        let tool = {
            let tools = server.tools.read().await;
            tools.get("add").cloned().unwrap()
        };
        let args = json!({"a": 2.0, "b": 3.0});
        let direct = tool
            .call(ToolContext::default(), args.as_object().unwrap().clone())
            .await
            .unwrap();

        let via_rpc = server
            .handle_message(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "add", "arguments": args}
            }))
            .await;
        assert_eq!(
            serde_json::to_value(&direct).unwrap(),
            via_rpc["result"]
        );
    }

    #[tokio::test]
    async fn registry_add_remove_list() {
        let server = ToolServer::new("dyn", "0.1.0");
        let tool = ToolBuilder::new("one")
            .description("first")
            .handler(|_ctx, _args| async move { Ok(ToolResult::text("1")) })
            .build()
            .unwrap();
        server.add_tool(Arc::new(tool)).await.unwrap();
        assert_eq!(server.list_tools().await, vec!["one".to_string()]);

        let dup = ToolBuilder::new("one")
            .description("dup")
            .handler(|_ctx, _args| async move { Ok(ToolResult::text("1")) })
            .build()
            .unwrap();
        assert!(server.add_tool(Arc::new(dup)).await.is_err());

        server.remove_tool("one").await.unwrap();
        assert!(server.remove_tool("one").await.is_err());
        assert!(server.list_tools().await.is_empty());
    }

    #[test]
    fn tool_name_routing() {
        assert_eq!(
            route_tool_name("mcp__s__t"),
            ToolRoute {
                is_mcp: true,
                server: "s",
                tool: "t"
            }
        );
        assert_eq!(
            route_tool_name("t"),
            ToolRoute {
                is_mcp: false,
                server: "",
                tool: "t"
            }
        );
        // A tool name containing the separator keeps its tail intact.
        assert_eq!(
            route_tool_name("mcp__calc__big__add"),
            ToolRoute {
                is_mcp: true,
                server: "calc",
                tool: "big__add"
            }
        );
        assert_eq!(route_tool_name("mcp__").is_mcp, false);
    }
}
