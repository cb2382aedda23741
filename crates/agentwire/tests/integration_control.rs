//! Control protocol integration tests over a mock transport
//!
//! Exercises request/response correlation, timeout and cancellation, the
//! at-most-once reply guarantee for inbound requests, and shutdown
//! semantics for pending waiters.

mod common;

use agentwire::callbacks::{permission_callback, CallbackRegistry, HookMatcherConfig};
use agentwire::testing::router_over;
use agentwire::{AgentError, HookEvent, HookMatcher, PermissionMode, PermissionResult};
use agentwire_protocol::control::ControlRequestBody;
use agentwire_protocol::hooks::HookJsonOutput;
use agentwire_transport::TransportError;
use common::mock_transport::mock_wire;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn empty_registry() -> Arc<CallbackRegistry> {
    Arc::new(CallbackRegistry::empty())
}

#[tokio::test]
async fn control_request_resolves_with_matching_response() {
    let (wire, handle) = mock_wire();
    let (router, _rx) = router_over(wire, empty_registry(), 10, false);

    let send = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .send_control(ControlRequestBody::Interrupt {}, Some(Duration::from_secs(2)))
                .await
        })
    };

    let (id, line) = handle.wait_for_control_request("interrupt").await;
    assert_eq!(line["type"], "control_request");
    handle.reply_success(&id, Some(json!({"ok": true}))).await;

    let outcome = send.await.unwrap().unwrap();
    assert_eq!(outcome, Some(json!({"ok": true})));
}

#[tokio::test]
async fn responses_correlate_by_id_not_arrival_order() {
    let (wire, handle) = mock_wire();
    let (router, _rx) = router_over(wire, empty_registry(), 10, false);

    let first = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .send_control(
                    ControlRequestBody::SetPermissionMode {
                        mode: PermissionMode::Plan,
                    },
                    Some(Duration::from_secs(2)),
                )
                .await
        })
    };
    let (first_id, _) = handle.wait_for_control_request("set_permission_mode").await;

    let second = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .send_control(ControlRequestBody::Interrupt {}, Some(Duration::from_secs(2)))
                .await
        })
    };
    let (second_id, _) = handle.wait_for_control_request("interrupt").await;
    assert_ne!(first_id, second_id);

    // Answer in reverse order; each waiter still gets its own payload.
    handle
        .reply_success(&second_id, Some(json!({"which": "second"})))
        .await;
    handle
        .reply_success(&first_id, Some(json!({"which": "first"})))
        .await;

    assert_eq!(
        first.await.unwrap().unwrap(),
        Some(json!({"which": "first"}))
    );
    assert_eq!(
        second.await.unwrap().unwrap(),
        Some(json!({"which": "second"}))
    );
}

#[tokio::test]
async fn peer_error_response_becomes_protocol_error() {
    let (wire, handle) = mock_wire();
    let (router, _rx) = router_over(wire, empty_registry(), 10, false);

    let send = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .send_control(ControlRequestBody::Interrupt {}, Some(Duration::from_secs(2)))
                .await
        })
    };
    let (id, _) = handle.wait_for_control_request("interrupt").await;
    handle.reply_error(&id, "not interruptible right now").await;

    let err = send.await.unwrap().unwrap_err();
    match err {
        AgentError::Protocol(message) => assert!(message.contains("not interruptible")),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_cancels_the_slot_and_late_reply_is_dropped() {
    let (wire, handle) = mock_wire();
    let (router, _rx) = router_over(wire, empty_registry(), 10, false);

    let err = router
        .send_control(ControlRequestBody::Interrupt {}, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    // The late reply hits an empty slot: dropped with a warning, and the
    // router keeps working.
    let (stale_id, _) = handle.wait_for_control_request("interrupt").await;
    handle.reply_success(&stale_id, None).await;

    let send = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .send_control(ControlRequestBody::Interrupt {}, Some(Duration::from_secs(2)))
                .await
        })
    };
    // Answer the second interrupt, the one still pending.
    let line = handle
        .wait_for_written(|v| {
            v["type"] == "control_request"
                && v["request"]["subtype"] == "interrupt"
                && v["request_id"] != json!(stale_id.clone())
        })
        .await;
    let pending_id = line["request_id"].as_str().unwrap().to_string();
    handle.reply_success(&pending_id, None).await;
    assert!(send.await.unwrap().is_ok());
}

#[tokio::test]
async fn cancellation_resolves_waiter_with_cancelled() {
    let (wire, handle) = mock_wire();
    let (router, _rx) = router_over(wire, empty_registry(), 10, false);

    let cancel = tokio_util::sync::CancellationToken::new();
    let send = {
        let router = Arc::clone(&router);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            router
                .send_control_with(ControlRequestBody::Interrupt {}, None, cancel)
                .await
        })
    };
    handle.wait_for_control_request("interrupt").await;

    cancel.cancel();
    let err = send.await.unwrap().unwrap_err();
    assert!(matches!(err, AgentError::Cancelled));
}

#[tokio::test]
async fn shutdown_fails_pending_waiters_with_connection_closed() {
    // Graceful shutdown with a control request in flight: the waiter
    // resolves with ConnectionClosed and the transport is closed.
    let (wire, handle) = mock_wire();
    let (router, _rx) = router_over(wire, empty_registry(), 10, false);

    let send = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router.send_control(ControlRequestBody::Interrupt {}, None).await
        })
    };
    handle.wait_for_control_request("interrupt").await;

    router.shutdown().await.unwrap();
    let err = send.await.unwrap().unwrap_err();
    assert!(err.is_connection_closed());
    assert!(handle.is_closed());

    // Further control requests fail fast.
    let err = router
        .send_control(ControlRequestBody::Interrupt {}, None)
        .await
        .unwrap_err();
    assert!(err.is_connection_closed());
}

#[tokio::test]
async fn inbound_can_use_tool_gets_exactly_one_success_reply() {
    // Permission deny with a custom message, answered on the wire with the
    // same request id.
    let registry = Arc::new(CallbackRegistry::new(
        Some(permission_callback(|req| async move {
            if req.tool_name == "Write" && req.input["file_path"] == "/etc/passwd" {
                Ok(PermissionResult::deny("system path blocked"))
            } else {
                Ok(PermissionResult::allow())
            }
        })),
        HashMap::new(),
        HashMap::new(),
        PermissionMode::Default,
    ));

    let (wire, handle) = mock_wire();
    let (_router, _rx) = router_over(wire, registry, 10, false);

    handle
        .push(json!({
            "type": "control_request",
            "request_id": "req_77",
            "request": {
                "subtype": "can_use_tool",
                "tool_name": "Write",
                "input": {"file_path": "/etc/passwd", "content": "x"}
            }
        }))
        .await;

    let reply = handle
        .wait_for_written(|v| v["type"] == "control_response")
        .await;
    assert_eq!(reply["response"]["subtype"], "success");
    assert_eq!(reply["response"]["request_id"], "req_77");
    assert_eq!(reply["response"]["response"]["behavior"], "deny");
    assert_eq!(reply["response"]["response"]["message"], "system path blocked");

    // Exactly one reply for that id.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let replies: Vec<_> = handle
        .written()
        .await
        .into_iter()
        .filter(|v| v["type"] == "control_response")
        .collect();
    assert_eq!(replies.len(), 1);
}

#[tokio::test]
async fn inbound_hook_callback_round_trip() {
    let mut hooks = HashMap::new();
    hooks.insert(
        HookEvent::PreToolUse,
        vec![HookMatcherConfig::new(
            HookMatcher::tool("Bash"),
            vec![agentwire::hook_callback(|input, ctx| async move {
                assert_eq!(ctx.tool_use_id.as_deref(), Some("toolu_5"));
                assert_eq!(input.base().cwd, "/work");
                Ok(HookJsonOutput::block("blocked by hook"))
            })],
        )],
    );
    let registry = Arc::new(CallbackRegistry::new(
        None,
        hooks,
        HashMap::new(),
        PermissionMode::Default,
    ));
    let callback_id = registry.initialize_request().hooks.unwrap()["PreToolUse"][0]
        .hook_callback_ids[0]
        .clone();

    let (wire, handle) = mock_wire();
    let (_router, _rx) = router_over(wire, registry, 10, false);

    handle
        .push(json!({
            "type": "control_request",
            "request_id": "req_hook",
            "request": {
                "subtype": "hook_callback",
                "callback_id": callback_id,
                "input": {
                    "hook_event_name": "PreToolUse",
                    "session_id": "s",
                    "transcript_path": "/tmp/t",
                    "cwd": "/work",
                    "tool_name": "Bash",
                    "tool_input": {"command": "rm"}
                },
                "tool_use_id": "toolu_5"
            }
        }))
        .await;

    let reply = handle
        .wait_for_written(|v| v["type"] == "control_response")
        .await;
    assert_eq!(reply["response"]["subtype"], "success");
    assert_eq!(reply["response"]["response"]["decision"], "block");
}

#[tokio::test]
async fn unknown_hook_callback_id_gets_error_reply() {
    let (wire, handle) = mock_wire();
    let (_router, _rx) = router_over(wire, empty_registry(), 10, false);

    handle
        .push(json!({
            "type": "control_request",
            "request_id": "req_missing",
            "request": {
                "subtype": "hook_callback",
                "callback_id": "hook_404",
                "input": {}
            }
        }))
        .await;

    let reply = handle
        .wait_for_written(|v| v["type"] == "control_response")
        .await;
    assert_eq!(reply["response"]["subtype"], "error");
    assert_eq!(reply["response"]["request_id"], "req_missing");
    assert!(reply["response"]["error"]
        .as_str()
        .unwrap()
        .contains("hook_404"));
}

#[tokio::test]
async fn orphan_control_response_is_dropped_silently() {
    let (wire, handle) = mock_wire();
    let (router, mut rx) = router_over(wire, empty_registry(), 10, false);

    handle.reply_success("req_never_sent", None).await;

    // Router still routes conversational traffic afterwards.
    handle
        .push(json!({"type": "system", "subtype": "info", "data": {}}))
        .await;
    let message = rx.recv().await.unwrap().unwrap();
    assert_eq!(message.type_name(), "system");

    router.shutdown().await.unwrap();
}

#[tokio::test]
async fn fatal_stream_error_fails_pending_and_ends_consumer() {
    let (wire, handle) = mock_wire();
    let (router, mut rx) = router_over(wire, empty_registry(), 10, false);

    let send = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router.send_control(ControlRequestBody::Interrupt {}, None).await
        })
    };
    handle.wait_for_control_request("interrupt").await;

    // Oversize line: the codec latches overflow and aborts the stream.
    handle
        .push_error(TransportError::Overflow { limit: 1024 * 1024 })
        .await;

    let err = rx.recv().await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        AgentError::Transport(TransportError::Overflow { .. })
    ));
    assert!(rx.recv().await.is_none());

    let err = send.await.unwrap().unwrap_err();
    assert!(err.is_connection_closed());

    // close() still succeeds after the failure.
    router.shutdown().await.unwrap();
}
