//! In-process MCP server integration over the control channel

mod common;

use agentwire::callbacks::CallbackRegistry;
use agentwire::mcp::{ToolBuilder, ToolResult, ToolServer};
use agentwire::testing::router_over;
use agentwire::PermissionMode;
use common::mock_transport::mock_wire;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn calc_registry() -> Arc<CallbackRegistry> {
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
    let server = Arc::new(ToolServer::new("calc", "1.0.0").with_tool(add).unwrap());

    let mut servers = HashMap::new();
    servers.insert("calc".to_string(), server);
    Arc::new(CallbackRegistry::new(
        None,
        HashMap::new(),
        servers,
        PermissionMode::Default,
    ))
}

#[tokio::test]
async fn tools_call_round_trip_through_the_control_channel() {
    let (wire, handle) = mock_wire();
    let (_router, _rx) = router_over(wire, calc_registry(), 10, false);

    handle
        .push(json!({
            "type": "control_request",
            "request_id": "req_mcp_1",
            "request": {
                "subtype": "mcp_message",
                "server_name": "calc",
                "message": {
                    "jsonrpc": "2.0",
                    "id": 7,
                    "method": "tools/call",
                    "params": {"name": "add", "arguments": {"a": 2.5, "b": 3.5}}
                }
            }
        }))
        .await;

    let reply = handle
        .wait_for_written(|v| v["type"] == "control_response")
        .await;
    assert_eq!(reply["response"]["subtype"], "success");
    assert_eq!(reply["response"]["request_id"], "req_mcp_1");

    let rpc = &reply["response"]["response"]["mcp_response"];
    assert_eq!(rpc["jsonrpc"], "2.0");
    assert_eq!(rpc["id"], 7);
    assert_eq!(rpc["result"]["isError"], false);
    assert_eq!(rpc["result"]["content"][0]["type"], "text");
    assert_eq!(rpc["result"]["content"][0]["text"], "6");
}

#[tokio::test]
async fn tools_list_through_the_control_channel() {
    let (wire, handle) = mock_wire();
    let (_router, _rx) = router_over(wire, calc_registry(), 10, false);

    handle
        .push(json!({
            "type": "control_request",
            "request_id": "req_mcp_2",
            "request": {
                "subtype": "mcp_message",
                "server_name": "calc",
                "message": {"jsonrpc": "2.0", "id": 1, "method": "tools/list"}
            }
        }))
        .await;

    let reply = handle
        .wait_for_written(|v| v["type"] == "control_response")
        .await;
    let tools = &reply["response"]["response"]["mcp_response"]["result"]["tools"];
    assert_eq!(tools.as_array().unwrap().len(), 1);
    assert_eq!(tools[0]["name"], "add");
}

#[tokio::test]
async fn unknown_server_yields_method_not_found_payload() {
    let (wire, handle) = mock_wire();
    let (_router, _rx) = router_over(wire, calc_registry(), 10, false);

    handle
        .push(json!({
            "type": "control_request",
            "request_id": "req_mcp_3",
            "request": {
                "subtype": "mcp_message",
                "server_name": "ghost",
                "message": {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
            }
        }))
        .await;

    let reply = handle
        .wait_for_written(|v| v["type"] == "control_response")
        .await;
    // The control response succeeds; the JSON-RPC payload carries the error.
    assert_eq!(reply["response"]["subtype"], "success");
    assert_eq!(
        reply["response"]["response"]["mcp_response"]["error"]["code"],
        agentwire::mcp::ERROR_METHOD_NOT_FOUND
    );
}

#[tokio::test]
async fn invalid_arguments_reported_as_invalid_params() {
    let (wire, handle) = mock_wire();
    let (_router, _rx) = router_over(wire, calc_registry(), 10, false);

    handle
        .push(json!({
            "type": "control_request",
            "request_id": "req_mcp_4",
            "request": {
                "subtype": "mcp_message",
                "server_name": "calc",
                "message": {
                    "jsonrpc": "2.0",
                    "id": 3,
                    "method": "tools/call",
                    "params": {"name": "add", "arguments": {"a": 2.5, "c": 1.0}}
                }
            }
        }))
        .await;

    let reply = handle
        .wait_for_written(|v| v["type"] == "control_response")
        .await;
    let error = &reply["response"]["response"]["mcp_response"]["error"];
    assert_eq!(error["code"], agentwire::mcp::ERROR_INVALID_PARAMS);
}
