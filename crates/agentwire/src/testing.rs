//! Test support
//!
//! Builds sessions over arbitrary [`WireTransport`] implementations so
//! behavior can be exercised without spawning a real Agent CLI. Used by
//! this crate's integration tests; available to downstream tests as well.

use crate::callbacks::CallbackRegistry;
use crate::error::Result;
use crate::routing::{ProtocolRouter, WireTransport};
use crate::session::Session;
use agentwire_protocol::message::Message;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Start a router over any transport, skipping the `initialize` handshake
pub fn router_over<T: WireTransport>(
    transport: T,
    callbacks: Arc<CallbackRegistry>,
    consumer_capacity: usize,
    include_partial_messages: bool,
) -> (Arc<ProtocolRouter>, mpsc::Receiver<Result<Message>>) {
    let (router, rx) = ProtocolRouter::start(
        transport,
        callbacks,
        consumer_capacity,
        include_partial_messages,
    );
    (Arc::new(router), rx)
}

/// Build a connected-looking session over any transport
///
/// No subprocess, no handshake: turns and control requests flow through
/// the given transport as-is.
pub fn session_over<T: WireTransport>(
    transport: T,
    callbacks: Arc<CallbackRegistry>,
    consumer_capacity: usize,
) -> Session {
    let (router, rx) = router_over(transport, callbacks, consumer_capacity, false);
    Session::from_parts(router, rx)
}
