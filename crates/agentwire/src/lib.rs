//! agentwire: a typed SDK for driving an Agent CLI over JSON lines
//!
//! The SDK spawns the Agent CLI as a subprocess and speaks its
//! newline-delimited JSON protocol in both directions: conversational
//! turns stream in, and out-of-band *control requests* flow both ways on
//! the same channel, correlated by request id. Peer-initiated requests —
//! permission checks, lifecycle hooks, and in-process MCP tool calls — are
//! dispatched to callbacks registered here.
//!
//! # Front ends
//!
//! - [`query`] — one-shot: a transient transport, one turn, messages until
//!   the `result`.
//! - [`Session`] — stateful: send and drain turns, interrupt, switch
//!   permission modes, rewind file checkpoints.
//! - [`SharedSession`] — the serialized variant for sharing a session
//!   across workers, one exclusive turn at a time.
//!
//! # Example
//!
//! ```no_run
//! use agentwire::{query, AgentOptions, Message};
//!
//! # async fn example() -> agentwire::Result<()> {
//! let mut stream = query("What is 2+2?", AgentOptions::new()).await?;
//! while let Some(message) = stream.next().await {
//!     if let Message::Assistant(reply) = message? {
//!         println!("{}", reply.text());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod callbacks;
pub mod error;
pub mod mcp;
pub mod message_parser;
pub mod options;
pub mod query;
pub mod routing;
pub mod session;
pub mod testing;

pub use callbacks::{
    hook_callback, permission_callback, CallbackRegistry, HookCallback, HookMatcherConfig,
    PermissionCallback, ToolPermissionRequest,
};
pub use error::{AgentError, Result};
pub use message_parser::{parse_message, parse_message_line, MessageParseError};
pub use options::{
    AgentDefinition, AgentOptions, McpServerConfig, SettingSource, SystemPrompt, ToolSpec,
};
pub use query::{query, query_with_content, QueryStream};
pub use routing::{ProtocolRouter, WireTransport};
pub use session::{ResponseStream, Session, SharedSession};

pub use agentwire_protocol::{
    AssistantErrorKind, AssistantMessage, ContentBlock, HookContext, HookEvent, HookInput,
    HookJsonOutput, HookMatcher, Message, PermissionMode, PermissionResult, PermissionUpdate,
    ResultMessage, StreamEventMessage, SystemMessage, UserContent, UserMessage,
};
pub use agentwire_transport::{StderrObserver, TransportError};
