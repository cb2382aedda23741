//! Error taxonomy for the SDK
//!
//! Every failure is inspectable by kind and carries its causal chain
//! through `std::error::Error::source`.

use crate::message_parser::MessageParseError;
use agentwire_transport::TransportError;
use std::time::Duration;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors surfaced by the SDK
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Transport-level failure: missing CLI, spawn/IO errors, codec
    /// overflow, abnormal exit, stderr-latched session errors.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Schema-valid JSON with an unknown or invalid shape.
    #[error(transparent)]
    Parse(#[from] MessageParseError),

    /// Control protocol violation: unknown request id, missing handler,
    /// error reply from the peer.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A control request was not answered in time.
    #[error("control request timed out after {0:?}")]
    Timeout(Duration),

    /// The operation was cancelled by its cancellation signal.
    #[error("operation cancelled")]
    Cancelled,

    /// A tool use was denied; surfaced only when the consumer opts to
    /// fail a turn on a deny outcome.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid SDK configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// The Agent CLI binary could not be located
    pub fn is_cli_not_found(&self) -> bool {
        matches!(self, Self::Transport(t) if t.is_cli_not_found())
    }

    /// The transport closed while the operation was pending
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Closed))
    }

    /// The CLI rejected the configured session id
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, Self::Transport(TransportError::SessionNotFound { .. }))
    }

    /// The process exited abnormally
    pub fn is_process_error(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Process { .. }))
    }

    /// A single line failed to decode or parse; the transport survives these
    pub fn is_line_error(&self) -> bool {
        matches!(self, Self::Parse(_))
            || matches!(self, Self::Transport(TransportError::Decode { .. }))
    }

    /// The operation timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
