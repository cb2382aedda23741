//! Conversational message types
//!
//! Messages exchanged with the Agent CLI are a tagged union on a top-level
//! `type` field. The encoder always writes the flat form; the decoder (see
//! the message parser in the `agentwire` crate) also accepts the nested
//! `message.{content, model, ...}` wire variant the CLI emits.

use crate::content::ContentBlock;
use serde::{Deserialize, Serialize};

/// A message exchanged with the Agent CLI
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A user turn (outgoing, or echoed back by the CLI).
    User(UserMessage),
    /// An assistant turn.
    Assistant(AssistantMessage),
    /// A system notification from the CLI.
    System(SystemMessage),
    /// The terminal message of a turn.
    Result(ResultMessage),
    /// A partial-message streaming event.
    StreamEvent(StreamEventMessage),
}

impl Message {
    /// Get the wire discriminant of this message
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::System(_) => "system",
            Self::Result(_) => "result",
            Self::StreamEvent(_) => "stream_event",
        }
    }

    /// Check whether this message terminates a turn
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Borrow the result message, if this is one
    pub fn as_result(&self) -> Option<&ResultMessage> {
        match self {
            Self::Result(r) => Some(r),
            _ => None,
        }
    }

    /// Borrow the assistant message, if this is one
    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Self::Assistant(a) => Some(a),
            _ => None,
        }
    }
}

/// User message content: a bare prompt string or an ordered block list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UserContent {
    /// Plain prompt text.
    Text(String),
    /// Structured content blocks (e.g. tool results).
    Blocks(Vec<ContentBlock>),
}

impl From<&str> for UserContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for UserContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<ContentBlock>> for UserContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::Blocks(blocks)
    }
}

/// A user turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserMessage {
    /// The turn content.
    pub content: UserContent,

    /// Tool-use id of the subagent invocation that produced this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,

    /// Message identity, usable as a rewind checkpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl UserMessage {
    /// Create a user message from prompt text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: UserContent::Text(text.into()),
            parent_tool_use_id: None,
            uuid: None,
        }
    }

    /// Create a user message from content blocks
    pub fn blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            content: UserContent::Blocks(blocks),
            parent_tool_use_id: None,
            uuid: None,
        }
    }
}

/// Known assistant-level error codes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssistantErrorKind {
    /// Credentials were rejected.
    AuthenticationFailed,
    /// A billing problem blocked the request.
    BillingError,
    /// The request was rate limited.
    RateLimit,
    /// The request was malformed.
    InvalidRequest,
    /// The backend failed.
    ServerError,
    /// Anything else.
    Unknown,
}

/// An assistant turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantMessage {
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,

    /// Model that produced the message.
    pub model: String,

    /// Tool-use id of the subagent invocation that produced this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,

    /// Error code when the turn failed at the API layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AssistantErrorKind>,
}

impl AssistantMessage {
    /// Concatenate all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| b.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All tool-use blocks as (id, name, input)
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content.iter().filter_map(|b| b.as_tool_use()).collect()
    }
}

/// A system notification from the CLI
///
/// Unknown subtypes are not an error; the payload stays dynamic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemMessage {
    /// Notification kind (e.g. `init`, `warning`). Open set.
    pub subtype: String,

    /// Raw notification payload.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl SystemMessage {
    /// Check if this is the session-init notification
    pub fn is_init(&self) -> bool {
        self.subtype == "init"
    }
}

/// The terminal message of a turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultMessage {
    /// Result kind (e.g. `success`, `error_during_execution`).
    pub subtype: String,

    /// Wall-clock duration of the turn in milliseconds.
    pub duration_ms: u64,

    /// Time spent in API calls in milliseconds.
    pub duration_api_ms: u64,

    /// Whether the turn failed.
    pub is_error: bool,

    /// Number of assistant turns taken.
    pub num_turns: u32,

    /// Session identifier.
    pub session_id: String,

    /// Total cost in USD, when the CLI reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,

    /// Aggregated token usage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Map<String, serde_json::Value>>,

    /// Final text result, when the CLI reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Structured output produced under an output-format schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<serde_json::Value>,
}

/// A partial-message streaming event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEventMessage {
    /// Event identity.
    pub uuid: String,

    /// Session identifier.
    pub session_id: String,

    /// The raw streaming event payload.
    pub event: serde_json::Value,

    /// Tool-use id of the subagent invocation that produced this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,
}
