//! In-process MCP tool servers
//!
//! A [`ToolServer`] hosts tools inside the client process and answers the
//! JSON-RPC 2.0 subset the Agent routes through `mcp_message` control
//! requests: `initialize`, `tools/list`, and `tools/call`. Tool arguments
//! are validated against the tool's JSON schema before the handler runs.
//!
//! # Example
//!
//! ```no_run
//! use agentwire::mcp::{ToolBuilder, ToolResult, ToolServer};
//!
//! let add = ToolBuilder::new("add")
//!     .description("Add two numbers")
//!     .number_param("a", "First number", true)
//!     .number_param("b", "Second number", true)
//!     .handler(|_ctx, args| async move {
//!         let a = args["a"].as_f64().unwrap_or(0.0);
//!         let b = args["b"].as_f64().unwrap_or(0.0);
//!         Ok(ToolResult::text(format!("{}", a + b)))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let server = ToolServer::new("calc", "1.0.0").with_tool(add).unwrap();
//! ```

pub mod protocol;
pub mod schema;
pub mod server;

pub use protocol::{
    error_response, success_response, JsonRpcRequest, ERROR_INTERNAL, ERROR_INVALID_PARAMS,
    ERROR_INVALID_REQUEST, ERROR_METHOD_NOT_FOUND, ERROR_PARSE,
};
pub use schema::{validate_arguments, SchemaViolation};
pub use server::{
    route_tool_name, FunctionTool, McpTool, ToolBuilder, ToolContext, ToolError, ToolResult,
    ToolRoute, ToolServer,
};
