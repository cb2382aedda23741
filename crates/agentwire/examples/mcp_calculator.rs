//! In-process MCP server: expose a calculator to the Agent without a
//! subprocess per tool server.

use agentwire::mcp::{ToolBuilder, ToolResult, ToolServer};
use agentwire::{query, AgentOptions, Message, ToolSpec};

#[tokio::main]
async fn main() -> agentwire::Result<()> {
    let add = ToolBuilder::new("add")
        .description("Add two numbers")
        .number_param("a", "First number", true)
        .number_param("b", "Second number", true)
        .handler(|_ctx, args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(ToolResult::text(format!("{}", a + b)))
        })
        .build()?;

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
        .build()?;

    let server = ToolServer::new("calc", "1.0.0")
        .with_tool(add)?
        .with_tool(divide)?;

    let options = AgentOptions::new()
        .with_tool_server(server)
        .with_allowed_tools(["mcp__calc__add", "mcp__calc__divide"])
        .with_tools(ToolSpec::Names(vec![]));

    let mut stream = query("Use the calculator to compute 2.5 + 3.5", options).await?;
    while let Some(message) = stream.next().await {
        match message? {
            Message::Assistant(reply) => println!("{}", reply.text()),
            Message::Result(result) => println!("done (error: {})", result.is_error),
            _ => {}
        }
    }

    Ok(())
}
