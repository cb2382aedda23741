//! Control protocol envelopes
//!
//! Control requests and responses ride the same JSON-line channel as
//! conversational messages, correlated by `request_id`. Requests flow in
//! both directions: the client initiates `initialize`, `interrupt`,
//! `set_permission_mode`, and `rewind_files`; the CLI initiates
//! `can_use_tool`, `hook_callback`, and `mcp_message`.

use crate::permissions::{PermissionMode, PermissionUpdate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Correlation id for a control request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a raw id from the wire
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hook registration advertised to the CLI during `initialize`
///
/// Each matcher maps an optional tool-name pattern to the callback ids the
/// CLI should fire back through `hook_callback` requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookRegistration {
    /// Tool-name pattern (e.g. `"Bash"`, `"Write|Edit"`); `None` matches all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,

    /// Stable callback ids, resolved by the client's dispatcher.
    #[serde(rename = "hookCallbackIds")]
    pub hook_callback_ids: Vec<String>,
}

/// Body of the `initialize` control request
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InitializeRequest {
    /// Hook registrations keyed by event name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<HashMap<String, Vec<HookRegistration>>>,
}

/// Body of a control request, tagged by `subtype`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlRequestBody {
    /// Session handshake with hook registrations.
    Initialize(InitializeRequest),

    /// Stop the in-flight turn.
    Interrupt {},

    /// The CLI asks whether a tool may run.
    CanUseTool {
        /// Tool about to run.
        tool_name: String,
        /// Proposed tool input.
        input: serde_json::Value,
        /// Permission updates the CLI suggests granting.
        #[serde(skip_serializing_if = "Option::is_none")]
        permission_suggestions: Option<Vec<PermissionUpdate>>,
        /// Path that triggered the check, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        blocked_path: Option<String>,
    },

    /// The CLI fires a registered hook.
    HookCallback {
        /// Callback id from the `initialize` registration.
        callback_id: String,
        /// Event-specific input payload.
        input: serde_json::Value,
        /// Tool invocation the hook is scoped to, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
    },

    /// Switch the global permission mode.
    SetPermissionMode {
        /// The new mode.
        mode: PermissionMode,
    },

    /// Revert file state to a prior user-message checkpoint.
    RewindFiles {
        /// UUID of the user message to rewind to.
        checkpoint_id: String,
    },

    /// The CLI routes a JSON-RPC message to an in-process MCP server.
    McpMessage {
        /// Target server name.
        server_name: String,
        /// Raw JSON-RPC 2.0 message.
        message: serde_json::Value,
    },
}

impl ControlRequestBody {
    /// The wire `subtype` of this request
    pub fn subtype(&self) -> &'static str {
        match self {
            Self::Initialize(_) => "initialize",
            Self::Interrupt {} => "interrupt",
            Self::CanUseTool { .. } => "can_use_tool",
            Self::HookCallback { .. } => "hook_callback",
            Self::SetPermissionMode { .. } => "set_permission_mode",
            Self::RewindFiles { .. } => "rewind_files",
            Self::McpMessage { .. } => "mcp_message",
        }
    }
}

/// Envelope for a control request line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlRequestEnvelope {
    /// Always `"control_request"`.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Correlation id, unique within the session.
    pub request_id: RequestId,

    /// The request body.
    pub request: ControlRequestBody,
}

impl ControlRequestEnvelope {
    /// Wrap a request body with a fresh id
    pub fn new(request: ControlRequestBody) -> Self {
        Self {
            message_type: "control_request".to_string(),
            request_id: RequestId::new(),
            request,
        }
    }
}

/// Body of a control response, tagged by `subtype`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlResponseBody {
    /// The peer handled the request.
    Success {
        /// Correlation id of the request being answered.
        request_id: RequestId,
        /// Handler result, shape depends on the request subtype.
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<serde_json::Value>,
    },

    /// The peer failed to handle the request.
    Error {
        /// Correlation id of the request being answered.
        request_id: RequestId,
        /// Normalized error message.
        error: String,
    },
}

impl ControlResponseBody {
    /// The correlation id this response answers
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Success { request_id, .. } | Self::Error { request_id, .. } => request_id,
        }
    }
}

/// Envelope for a control response line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlResponseEnvelope {
    /// Always `"control_response"`.
    #[serde(rename = "type")]
    pub message_type: String,

    /// The response body.
    pub response: ControlResponseBody,
}

impl ControlResponseEnvelope {
    /// Build a success response
    pub fn success(request_id: RequestId, response: Option<serde_json::Value>) -> Self {
        Self {
            message_type: "control_response".to_string(),
            response: ControlResponseBody::Success {
                request_id,
                response,
            },
        }
    }

    /// Build an error response
    pub fn error(request_id: RequestId, error: impl Into<String>) -> Self {
        Self {
            message_type: "control_response".to_string(),
            response: ControlResponseBody::Error {
                request_id,
                error: error.into(),
            },
        }
    }
}
