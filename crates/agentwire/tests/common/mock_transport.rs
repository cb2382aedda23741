//! Mock transport for testing without a real subprocess
//!
//! Simulates the Agent CLI side of the line protocol: the test pushes
//! inbound values through a handle, and every line the SDK writes is
//! captured for assertion.

// Not every test binary exercises every helper.
#![allow(dead_code)]

use agentwire::routing::WireTransport;
use agentwire_transport::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Channel capacity of the simulated stdout stream
const STREAM_CAPACITY: usize = 32;

/// The SDK-facing half of the mock
pub struct MockWire {
    stream: Option<mpsc::Receiver<Result<Value, TransportError>>>,
    written: Arc<Mutex<Vec<Value>>>,
    closed: Arc<AtomicBool>,
}

/// The test-facing half: push inbound traffic, inspect outbound lines
#[derive(Clone)]
pub struct MockHandle {
    tx: mpsc::Sender<Result<Value, TransportError>>,
    written: Arc<Mutex<Vec<Value>>>,
    closed: Arc<AtomicBool>,
}

/// Create a connected mock pair
pub fn mock_wire() -> (MockWire, MockHandle) {
    let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
    let written = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));
    (
        MockWire {
            stream: Some(rx),
            written: Arc::clone(&written),
            closed: Arc::clone(&closed),
        },
        MockHandle { tx, written, closed },
    )
}

#[async_trait]
impl WireTransport for MockWire {
    fn take_stream(&mut self) -> Option<mpsc::Receiver<Result<Value, TransportError>>> {
        self.stream.take()
    }

    async fn write_line(&self, line: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let value: Value = serde_json::from_slice(line)
            .map_err(|e| TransportError::Connection(format!("SDK wrote invalid JSON: {e}")))?;
        self.written.lock().await.push(value);
        Ok(())
    }

    async fn latched_error(&self) -> Option<TransportError> {
        None
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl MockHandle {
    /// Push one inbound value, as if the CLI printed it
    pub async fn push(&self, value: Value) {
        self.tx.send(Ok(value)).await.expect("stream open");
    }

    /// Push an inbound stream error
    pub async fn push_error(&self, error: TransportError) {
        self.tx.send(Err(error)).await.expect("stream open");
    }

    /// Simulate the CLI exiting (stdout EOF)
    pub fn end_stream(self) {
        drop(self.tx);
    }

    /// Everything the SDK has written so far
    pub async fn written(&self) -> Vec<Value> {
        self.written.lock().await.clone()
    }

    /// Whether the SDK closed the transport
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until a written line satisfies the predicate, returning it
    ///
    /// Panics after two seconds; mock traffic should be immediate.
    pub async fn wait_for_written<F>(&self, predicate: F) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            {
                let written = self.written.lock().await;
                if let Some(found) = written.iter().find(|v| predicate(v)) {
                    return found.clone();
                }
            }
            if tokio::time::Instant::now() > deadline {
                panic!("no written line matched within deadline");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Wait for the next control request of a given subtype and return
    /// (request_id, full line)
    pub async fn wait_for_control_request(&self, subtype: &str) -> (String, Value) {
        let line = self
            .wait_for_written(|v| {
                v["type"] == "control_request" && v["request"]["subtype"] == subtype
            })
            .await;
        let id = line["request_id"].as_str().expect("request_id").to_string();
        (id, line)
    }

    /// Reply success to a control request
    pub async fn reply_success(&self, request_id: &str, response: Option<Value>) {
        let mut body = serde_json::json!({
            "subtype": "success",
            "request_id": request_id,
        });
        if let Some(response) = response {
            body["response"] = response;
        }
        self.push(serde_json::json!({
            "type": "control_response",
            "response": body,
        }))
        .await;
    }

    /// Reply error to a control request
    pub async fn reply_error(&self, request_id: &str, error: &str) {
        self.push(serde_json::json!({
            "type": "control_response",
            "response": {
                "subtype": "error",
                "request_id": request_id,
                "error": error,
            },
        }))
        .await;
    }
}
