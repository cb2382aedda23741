//! Protocol router: demultiplexing and control correlation
//!
//! One reader task per session consumes the transport's value stream and
//! splits it three ways: conversational messages go to the bounded consumer
//! channel, inbound control requests are dispatched to the callback
//! registry on their own tasks, and control responses resolve the in-flight
//! table. Outbound control requests install a completion slot *before*
//! writing, so a fast peer cannot answer into a missing slot.
//!
//! Every outgoing control request resolves exactly once: with the matching
//! response, with a timeout (the slot is cancelled), or with
//! `ConnectionClosed` when the router shuts down.

use crate::callbacks::CallbackRegistry;
use crate::error::{AgentError, Result};
use crate::message_parser::parse_message;
use agentwire_protocol::control::{
    ControlRequestBody, ControlRequestEnvelope, ControlResponseBody, ControlResponseEnvelope,
    RequestId,
};
use agentwire_protocol::message::Message;
use agentwire_transport::{ProcessConfig, SubprocessTransport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Byte-stream peer the router runs over
///
/// Implemented by [`SubprocessTransport`]; tests substitute a scripted
/// in-memory peer.
#[async_trait]
pub trait WireTransport: Send + Sync + 'static {
    /// Take the single-consumer stream of decoded JSON values.
    fn take_stream(
        &mut self,
    ) -> Option<mpsc::Receiver<std::result::Result<Value, TransportError>>>;

    /// Write one JSON line; serialized and flushed by the implementation.
    async fn write_line(&self, line: &[u8]) -> std::result::Result<(), TransportError>;

    /// The latched fatal error, if any.
    async fn latched_error(&self) -> Option<TransportError>;

    /// Terminate the peer.
    async fn close(&self) -> std::result::Result<(), TransportError>;
}

#[async_trait]
impl WireTransport for SubprocessTransport {
    fn take_stream(
        &mut self,
    ) -> Option<mpsc::Receiver<std::result::Result<Value, TransportError>>> {
        self.messages()
    }

    async fn write_line(&self, line: &[u8]) -> std::result::Result<(), TransportError> {
        SubprocessTransport::write_line(self, line).await
    }

    async fn latched_error(&self) -> Option<TransportError> {
        SubprocessTransport::latched_error(self).await
    }

    async fn close(&self) -> std::result::Result<(), TransportError> {
        SubprocessTransport::close(self).await
    }
}

/// Spawn a [`SubprocessTransport`] from a process config
pub fn spawn_transport(config: ProcessConfig) -> Result<SubprocessTransport> {
    Ok(SubprocessTransport::spawn(config)?)
}

type ControlOutcome = Result<Option<Value>>;
type Inflight = Arc<Mutex<HashMap<String, oneshot::Sender<ControlOutcome>>>>;

/// Router over one transport: correlation table plus reader task
pub struct ProtocolRouter {
    transport: Arc<dyn WireTransport>,
    callbacks: Arc<CallbackRegistry>,
    inflight: Inflight,
    closed: Arc<AtomicBool>,
    reader_handle: JoinHandle<()>,
}

impl ProtocolRouter {
    /// Start the router over a transport
    ///
    /// Returns the router and the bounded consumer channel of
    /// conversational messages.
    pub fn start<T: WireTransport>(
        mut transport: T,
        callbacks: Arc<CallbackRegistry>,
        consumer_capacity: usize,
        include_partial_messages: bool,
    ) -> (Self, mpsc::Receiver<Result<Message>>) {
        let stream = transport.take_stream();
        let transport: Arc<dyn WireTransport> = Arc::new(transport);
        let inflight: Inflight = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (message_tx, message_rx) = mpsc::channel(consumer_capacity.max(1));

        let reader_handle = {
            let transport = Arc::clone(&transport);
            let callbacks = Arc::clone(&callbacks);
            let inflight = Arc::clone(&inflight);
            tokio::spawn(async move {
                let Some(stream) = stream else {
                    warn!("transport stream already taken, router inert");
                    return;
                };
                Self::reader_loop(
                    stream,
                    transport,
                    callbacks,
                    Arc::clone(&inflight),
                    message_tx,
                    include_partial_messages,
                )
                .await;
                // Whatever ended the stream, nothing will answer anymore.
                fail_all(&inflight, || TransportError::Closed.into()).await;
            })
        };

        (
            Self {
                transport,
                callbacks,
                inflight,
                closed,
                reader_handle,
            },
            message_rx,
        )
    }

    async fn reader_loop(
        mut stream: mpsc::Receiver<std::result::Result<Value, TransportError>>,
        transport: Arc<dyn WireTransport>,
        callbacks: Arc<CallbackRegistry>,
        inflight: Inflight,
        message_tx: mpsc::Sender<Result<Message>>,
        include_partial_messages: bool,
    ) {
        while let Some(item) = stream.recv().await {
            match item {
                Ok(value) => {
                    let message_type = value
                        .get("type")
                        .and_then(Value::as_str)
                        .map(str::to_owned);
                    match message_type.as_deref() {
                        Some("control_response") => {
                            Self::handle_control_response(&inflight, &value).await;
                        }
                        Some("control_request") => {
                            Self::handle_control_request(&transport, &callbacks, value);
                        }
                        _ => match parse_message(value) {
                            Ok(Message::StreamEvent(_)) if !include_partial_messages => {}
                            Ok(message) => {
                                if message_tx.send(Ok(message)).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                // One bad line does not take the session
                                // down; surface it out-of-band.
                                warn!(error = %e, "dropping unparseable line");
                                if message_tx.send(Err(e.into())).await.is_err() {
                                    return;
                                }
                            }
                        },
                    }
                }
                Err(e) if e.is_fatal() => {
                    let _ = message_tx.send(Err(e.into())).await;
                    return;
                }
                Err(e) => {
                    // Single-line decode failure; transport stays alive.
                    if message_tx.send(Err(e.into())).await.is_err() {
                        return;
                    }
                }
            }
        }

        // EOF: surface a latched fatal error (overflow, process exit,
        // session-not-found) before the channel closes.
        if let Some(e) = transport.latched_error().await {
            let _ = message_tx.send(Err(e.into())).await;
        }
    }

    async fn handle_control_response(inflight: &Inflight, value: &Value) {
        let body: ControlResponseBody = match value
            .get("response")
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(body)) => body,
            _ => {
                warn!("malformed control_response, dropping");
                return;
            }
        };

        let id = body.request_id().as_str().to_string();
        let slot = inflight.lock().await.remove(&id);
        match slot {
            Some(tx) => {
                let outcome = match body {
                    ControlResponseBody::Success { response, .. } => Ok(response),
                    ControlResponseBody::Error { error, .. } => {
                        Err(AgentError::Protocol(error))
                    }
                };
                // Receiver may have timed out or been cancelled; that
                // orphan is dropped silently.
                let _ = tx.send(outcome);
            }
            None => {
                // Unknown or already-resolved id: log and drop.
                warn!(request_id = %id, "control response with unknown request id");
            }
        }
    }

    /// Dispatch an inbound control request on its own task
    ///
    /// Handlers are fallible and may be long-running; they must never block
    /// the reader. Exactly one response is written per request id.
    fn handle_control_request(
        transport: &Arc<dyn WireTransport>,
        callbacks: &Arc<CallbackRegistry>,
        value: Value,
    ) {
        let Some(request_id) = value
            .get("request_id")
            .and_then(Value::as_str)
            .map(RequestId::from_string)
        else {
            warn!("control_request without request_id, dropping");
            return;
        };

        let body = value
            .get("request")
            .cloned()
            .map(serde_json::from_value::<ControlRequestBody>);

        let transport = Arc::clone(transport);
        let callbacks = Arc::clone(callbacks);
        tokio::spawn(async move {
            let envelope = match body {
                Some(Ok(body)) => match callbacks.dispatch(body).await {
                    Ok(response) => ControlResponseEnvelope::success(request_id, response),
                    Err(message) => ControlResponseEnvelope::error(request_id, message),
                },
                _ => ControlResponseEnvelope::error(request_id, "malformed control request"),
            };

            match serde_json::to_vec(&envelope) {
                Ok(line) => {
                    if let Err(e) = transport.write_line(&line).await {
                        warn!(error = %e, "failed to write control response");
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode control response"),
            }
        });
    }

    /// Send a control request and await its correlated response
    pub async fn send_control(
        &self,
        body: ControlRequestBody,
        timeout: Option<Duration>,
    ) -> ControlOutcome {
        self.send_control_with(body, timeout, CancellationToken::new())
            .await
    }

    /// Send a control request with an external cancellation signal
    pub async fn send_control_with(
        &self,
        body: ControlRequestBody,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> ControlOutcome {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed.into());
        }

        let envelope = ControlRequestEnvelope::new(body);
        let id = envelope.request_id.as_str().to_string();
        let (tx, rx) = oneshot::channel();

        // Install before writing: the peer may answer immediately.
        self.inflight.lock().await.insert(id.clone(), tx);

        let line = match serde_json::to_vec(&envelope) {
            Ok(line) => line,
            Err(e) => {
                self.inflight.lock().await.remove(&id);
                return Err(AgentError::Protocol(format!(
                    "failed to encode control request: {e}"
                )));
            }
        };
        if let Err(e) = self.transport.write_line(&line).await {
            self.inflight.lock().await.remove(&id);
            return Err(e.into());
        }

        let wait = async {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Closed.into()),
            }
        };

        tokio::select! {
            outcome = async {
                match timeout {
                    Some(limit) => match tokio::time::timeout(limit, wait).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            self.inflight.lock().await.remove(&id);
                            Err(AgentError::Timeout(limit))
                        }
                    },
                    None => wait.await,
                }
            } => outcome,
            _ = cancel.cancelled() => {
                // The peer may still answer; the orphan response is dropped
                // with a protocol warning by the reader.
                self.inflight.lock().await.remove(&id);
                Err(AgentError::Cancelled)
            }
        }
    }

    /// Write a conversational user turn
    pub async fn write_user_turn(&self, content: &Value) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed.into());
        }
        let line = serde_json::to_vec(&serde_json::json!({
            "type": "user",
            "message": { "content": content },
        }))
        .map_err(|e| AgentError::Protocol(format!("failed to encode user turn: {e}")))?;
        self.transport.write_line(&line).await?;
        Ok(())
    }

    /// The callback registry this router dispatches into
    pub fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }

    /// The latched transport error, if any
    pub async fn latched_error(&self) -> Option<TransportError> {
        self.transport.latched_error().await
    }

    /// Shut the router down
    ///
    /// Closes the transport, cancels outstanding callbacks, and fails every
    /// pending control waiter with `ConnectionClosed`.
    pub async fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.callbacks.cancel_all();
        let close_result = self.transport.close().await;
        fail_all(&self.inflight, || TransportError::Closed.into()).await;
        self.reader_handle.abort();
        close_result?;
        Ok(())
    }
}

async fn fail_all(inflight: &Inflight, err: impl Fn() -> AgentError) {
    let mut table = inflight.lock().await;
    for (id, tx) in table.drain() {
        debug!(request_id = %id, "failing pending control request on close");
        let _ = tx.send(Err(err()));
    }
}
