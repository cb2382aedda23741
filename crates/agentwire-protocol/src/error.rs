//! Protocol-level error types

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised by pure type-level operations
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A value could not be encoded to or decoded from JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A tagged union carried a discriminant this crate does not know
    #[error("unknown discriminant `{value}` for {field}")]
    UnknownDiscriminant {
        /// The field holding the discriminant (e.g. `type`, `subtype`)
        field: &'static str,
        /// The unrecognized value
        value: String,
    },
}
