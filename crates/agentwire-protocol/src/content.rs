//! Content block types
//!
//! Represents the different kinds of content that can appear inside user and
//! assistant messages. The wire encoding is a tagged union on `type`.

use serde::{Deserialize, Serialize};

/// A content block in a message
///
/// Unknown block types are a hard parse error at the message-parser layer;
/// this enum intentionally has no catch-all variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    Text {
        /// The text content.
        text: String,
    },

    /// Extended reasoning emitted by the model.
    Thinking {
        /// The reasoning text.
        thinking: String,
        /// Integrity signature over the reasoning block.
        #[serde(default)]
        signature: String,
    },

    /// A request from the model to invoke a tool.
    ToolUse {
        /// Unique identifier for this tool invocation.
        id: String,
        /// Name of the tool to invoke.
        name: String,
        /// Tool input, an arbitrary JSON object.
        #[serde(default)]
        input: serde_json::Value,
    },

    /// The result of a tool invocation.
    ToolResult {
        /// The `id` of the `tool_use` block this result answers.
        tool_use_id: String,
        /// The tool output, either a bare string or nested blocks.
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<ToolResultContent>,
        /// Whether the tool failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Tool result content: the wire accepts a bare string or a block list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// Plain string output.
    Text(String),
    /// Structured output as an ordered list of content blocks.
    Blocks(Vec<ContentBlock>),
}

impl ContentBlock {
    /// Create a text content block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a thinking content block
    pub fn thinking(thinking: impl Into<String>, signature: impl Into<String>) -> Self {
        Self::Thinking {
            thinking: thinking.into(),
            signature: signature.into(),
        }
    }

    /// Create a tool use content block
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a successful tool result block with string content
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: Some(ToolResultContent::Text(content.into())),
            is_error: None,
        }
    }

    /// Create an error tool result block
    pub fn tool_error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: Some(ToolResultContent::Text(message.into())),
            is_error: Some(true),
        }
    }

    /// Get the wire discriminant of this block
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
        }
    }

    /// Check if this is a text block
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Check if this is a tool use block
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }

    /// Check if this is a tool result block
    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    /// Extract text if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Extract (id, name, input) if this is a tool use block
    pub fn as_tool_use(&self) -> Option<(&str, &str, &serde_json::Value)> {
        match self {
            Self::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        }
    }
}
