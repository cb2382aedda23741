//! Permission arbitration: deny writes to system paths, rewriting the rest.

use agentwire::{
    permission_callback, query, AgentOptions, Message, PermissionResult,
};

#[tokio::main]
async fn main() -> agentwire::Result<()> {
    let options = AgentOptions::new().with_can_use_tool(permission_callback(|req| async move {
        if req.tool_name == "Write" {
            if let Some(path) = req.input["file_path"].as_str() {
                if path.starts_with("/etc") {
                    return Ok(PermissionResult::deny("system path blocked"));
                }
            }
        }
        Ok(PermissionResult::allow())
    }));

    let mut stream = query("Create a file named notes.txt containing 'hello'", options).await?;
    while let Some(message) = stream.next().await {
        if let Message::Result(result) = message? {
            println!("turn done, is_error={}", result.is_error);
        }
    }

    Ok(())
}
