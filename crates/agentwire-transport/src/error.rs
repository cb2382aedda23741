//! Transport error types

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Maximum bytes of a raw line kept in a decode error, for logs
pub const MAX_ERROR_EXCERPT: usize = 4096;

/// Errors that can occur in transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The Agent CLI binary could not be located on disk.
    #[error("Agent CLI not found: {0}")]
    CliNotFound(String),

    /// Spawn or stream-level failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// I/O failure on a pipe.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A line exceeded the codec's buffer cap. Lines are never truncated;
    /// overflow aborts the stream.
    #[error("line exceeds maximum length of {limit} bytes")]
    Overflow {
        /// The configured cap.
        limit: usize,
    },

    /// A line was not valid JSON.
    #[error("malformed JSON line: {excerpt:?}")]
    Decode {
        /// The offending raw line, bounded to [`MAX_ERROR_EXCERPT`] bytes.
        excerpt: String,
        /// The underlying decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The process exited abnormally.
    #[error("Agent CLI exited with code {exit_code:?}")]
    Process {
        /// Exit code, `None` when killed by a signal.
        exit_code: Option<i32>,
        /// Trailing stderr lines captured before exit.
        stderr_tail: Vec<String>,
    },

    /// The CLI reported an unknown session id on stderr.
    #[error("no conversation found with session ID: {session_id}")]
    SessionNotFound {
        /// The id the CLI rejected.
        session_id: String,
    },

    /// The transport was closed while the operation was pending.
    #[error("connection closed")]
    Closed,
}

impl TransportError {
    /// Build a decode error with a bounded excerpt of the raw line
    pub fn decode(raw: &[u8], source: serde_json::Error) -> Self {
        let end = raw.len().min(MAX_ERROR_EXCERPT);
        Self::Decode {
            excerpt: String::from_utf8_lossy(&raw[..end]).into_owned(),
            source,
        }
    }

    /// Whether this error means the CLI binary was missing
    pub fn is_cli_not_found(&self) -> bool {
        matches!(self, Self::CliNotFound(_))
    }

    /// Whether this error is fatal to the stream (as opposed to a
    /// single-line decode failure)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Decode { .. })
    }

    /// Whether this error was caused by transport shutdown
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_excerpt_is_bounded() {
        let raw = vec![b'x'; MAX_ERROR_EXCERPT * 2];
        let source = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err = TransportError::decode(&raw, source);
        match err {
            TransportError::Decode { excerpt, .. } => {
                assert_eq!(excerpt.len(), MAX_ERROR_EXCERPT);
            }
            other => panic!("expected decode error, got {other}"),
        }
    }

    #[test]
    fn fatality_classification() {
        let source = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        assert!(!TransportError::decode(b"{", source).is_fatal());
        assert!(TransportError::Overflow { limit: 1 }.is_fatal());
        assert!(TransportError::Closed.is_fatal());
        assert!(TransportError::Closed.is_closed());
    }
}
