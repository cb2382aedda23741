//! Message parsing for the Agent CLI line protocol
//!
//! Decodes a JSON line into a typed [`Message`], recursively decoding
//! content blocks with union discrimination on `type`.
//!
//! The CLI emits `user` and `assistant` messages in two encodings: a flat
//! form with fields at the top level, and a nested form with the payload
//! under `message`. Both are accepted; when both carry a field, the nested
//! value wins. The encoder always writes the flat form.
//!
//! Unknown content block types are a hard parse error. Unknown `subtype`
//! values on system messages are not.

use agentwire_protocol::content::ContentBlock;
use agentwire_protocol::message::{
    AssistantMessage, Message, ResultMessage, StreamEventMessage, SystemMessage, UserContent,
    UserMessage,
};
use serde_json::Value;

/// Bound on raw-line excerpts carried in parse errors
const MAX_EXCERPT: usize = 4096;

/// Errors that can occur while parsing a message
#[derive(Debug, thiserror::Error)]
pub enum MessageParseError {
    /// The line was not a JSON object or had an invalid shape.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// A required field was missing.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The top-level `type` discriminant was not recognized.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// A content block carried an unknown `type` discriminant.
    #[error("unknown content block type: {0}")]
    UnknownContentBlock(String),

    /// A field failed to deserialize.
    #[error("malformed field {field}: {source}")]
    Malformed {
        /// The field that failed.
        field: &'static str,
        /// The decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The line was not valid JSON at all.
    #[error("malformed JSON line: {excerpt:?}")]
    Json {
        /// Bounded excerpt of the raw line.
        excerpt: String,
        /// The decoder error.
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a JSON value into a typed message
pub fn parse_message(data: Value) -> Result<Message, MessageParseError> {
    let obj = match &data {
        Value::Object(obj) => obj,
        other => {
            return Err(MessageParseError::InvalidFormat(format!(
                "expected object, got {}",
                excerpt(other)
            )));
        }
    };

    let message_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(MessageParseError::MissingField("type"))?;

    match message_type {
        "user" => parse_user(obj),
        "assistant" => parse_assistant(obj),
        "system" => parse_system(obj),
        "result" => parse_result(&data),
        "stream_event" => parse_stream_event(&data),
        other => Err(MessageParseError::UnknownType(other.to_string())),
    }
}

/// Parse a raw line into a typed message
pub fn parse_message_line(line: &[u8]) -> Result<Message, MessageParseError> {
    let value: Value =
        serde_json::from_slice(line).map_err(|source| MessageParseError::Json {
            excerpt: String::from_utf8_lossy(&line[..line.len().min(MAX_EXCERPT)]).into_owned(),
            source,
        })?;
    parse_message(value)
}

fn excerpt(value: &Value) -> String {
    let mut s = value.to_string();
    if s.len() > MAX_EXCERPT {
        let mut end = MAX_EXCERPT;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

/// Resolve a field that may live flat at the top level or nested under
/// `message`; the nested value wins when both are present.
fn flat_or_nested<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Option<&'a Value> {
    if let Some(Value::Object(nested)) = obj.get("message") {
        if let Some(value) = nested.get(field) {
            return Some(value);
        }
    }
    obj.get(field)
}

fn optional_string(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Option<String> {
    flat_or_nested(obj, field)
        .and_then(Value::as_str)
        .map(String::from)
}

fn parse_user(obj: &serde_json::Map<String, Value>) -> Result<Message, MessageParseError> {
    let content = flat_or_nested(obj, "content")
        .ok_or(MessageParseError::MissingField("content"))?;

    let content = match content {
        Value::String(text) => UserContent::Text(text.clone()),
        Value::Array(blocks) => UserContent::Blocks(parse_blocks(blocks)?),
        other => {
            return Err(MessageParseError::InvalidFormat(format!(
                "user content must be string or array, got {}",
                excerpt(other)
            )));
        }
    };

    Ok(Message::User(UserMessage {
        content,
        parent_tool_use_id: optional_string(obj, "parent_tool_use_id"),
        uuid: optional_string(obj, "uuid"),
    }))
}

fn parse_assistant(obj: &serde_json::Map<String, Value>) -> Result<Message, MessageParseError> {
    let content = flat_or_nested(obj, "content")
        .ok_or(MessageParseError::MissingField("content"))?;
    let blocks = match content {
        Value::Array(blocks) => parse_blocks(blocks)?,
        other => {
            return Err(MessageParseError::InvalidFormat(format!(
                "assistant content must be an array, got {}",
                excerpt(other)
            )));
        }
    };

    let model = flat_or_nested(obj, "model")
        .and_then(Value::as_str)
        .ok_or(MessageParseError::MissingField("model"))?
        .to_string();

    let error = match flat_or_nested(obj, "error") {
        Some(value) if !value.is_null() => Some(
            serde_json::from_value(value.clone())
                .map_err(|source| MessageParseError::Malformed {
                    field: "error",
                    source,
                })?,
        ),
        _ => None,
    };

    Ok(Message::Assistant(AssistantMessage {
        content: blocks,
        model,
        parent_tool_use_id: optional_string(obj, "parent_tool_use_id"),
        error,
    }))
}

fn parse_system(obj: &serde_json::Map<String, Value>) -> Result<Message, MessageParseError> {
    // Unknown subtypes are fine; the payload stays dynamic.
    let subtype = obj
        .get("subtype")
        .and_then(Value::as_str)
        .ok_or(MessageParseError::MissingField("subtype"))?
        .to_string();

    // Notifications carry either an explicit `data` object or their payload
    // spread at the top level; an explicit `data` wins.
    let data = match obj.get("data").and_then(Value::as_object) {
        Some(data) => data.clone(),
        None => {
            let mut data = serde_json::Map::new();
            for (key, value) in obj {
                if key != "type" && key != "subtype" {
                    data.insert(key.clone(), value.clone());
                }
            }
            data
        }
    };

    Ok(Message::System(SystemMessage { subtype, data }))
}

fn parse_result(data: &Value) -> Result<Message, MessageParseError> {
    let msg: ResultMessage =
        serde_json::from_value(data.clone()).map_err(|source| MessageParseError::Malformed {
            field: "result",
            source,
        })?;
    Ok(Message::Result(msg))
}

fn parse_stream_event(data: &Value) -> Result<Message, MessageParseError> {
    let msg: StreamEventMessage =
        serde_json::from_value(data.clone()).map_err(|source| MessageParseError::Malformed {
            field: "stream_event",
            source,
        })?;
    Ok(Message::StreamEvent(msg))
}

fn parse_blocks(blocks: &[Value]) -> Result<Vec<ContentBlock>, MessageParseError> {
    blocks.iter().map(parse_block).collect()
}

fn parse_block(block: &Value) -> Result<ContentBlock, MessageParseError> {
    let block_type = block
        .get("type")
        .and_then(Value::as_str)
        .ok_or(MessageParseError::MissingField("content block type"))?;

    match block_type {
        "text" | "thinking" | "tool_use" | "tool_result" => serde_json::from_value(block.clone())
            .map_err(|source| MessageParseError::Malformed {
                field: "content block",
                source,
            }),
        other => Err(MessageParseError::UnknownContentBlock(other.to_string())),
    }
}
