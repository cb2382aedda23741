//! Hook event types
//!
//! The Agent fires hooks at twelve lifecycle points. Each event has a typed
//! input carrying a shared base (session id, transcript path, cwd) plus
//! event-specific fields, and a typed output controlling how the Agent
//! proceeds. Inputs arrive through `hook_callback` control requests and are
//! decoded with [`HookInput::from_value`].

use serde::{Deserialize, Serialize};

/// The twelve hook lifecycle events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before a tool runs.
    PreToolUse,
    /// After a tool ran.
    PostToolUse,
    /// When the user submits a prompt.
    UserPromptSubmit,
    /// Before the prompt is sent to the model.
    PrePrompt,
    /// After the prompt round-trip completed.
    PostPrompt,
    /// Before the response is surfaced.
    PreResponse,
    /// After the response was surfaced.
    PostResponse,
    /// When the main agent stops.
    Stop,
    /// When a subagent stops.
    SubagentStop,
    /// Before a history compaction.
    PreCompact,
    /// After a history compaction.
    PostCompact,
    /// When the Agent hits an error.
    OnError,
}

impl HookEvent {
    /// All events, in wire order
    pub const ALL: [HookEvent; 12] = [
        HookEvent::PreToolUse,
        HookEvent::PostToolUse,
        HookEvent::UserPromptSubmit,
        HookEvent::PrePrompt,
        HookEvent::PostPrompt,
        HookEvent::PreResponse,
        HookEvent::PostResponse,
        HookEvent::Stop,
        HookEvent::SubagentStop,
        HookEvent::PreCompact,
        HookEvent::PostCompact,
        HookEvent::OnError,
    ];

    /// The wire name of this event
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PrePrompt => "PrePrompt",
            Self::PostPrompt => "PostPrompt",
            Self::PreResponse => "PreResponse",
            Self::PostResponse => "PostResponse",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
            Self::PreCompact => "PreCompact",
            Self::PostCompact => "PostCompact",
            Self::OnError => "OnError",
        }
    }
}

/// Fields shared by every hook input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HookInputBase {
    /// Session the event fired in.
    #[serde(default)]
    pub session_id: String,

    /// Path to the session transcript.
    #[serde(default)]
    pub transcript_path: String,

    /// Working directory of the Agent.
    #[serde(default)]
    pub cwd: String,

    /// Active permission mode, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
}

/// Typed input for a hook invocation, discriminated by `hook_event_name`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "hook_event_name")]
pub enum HookInput {
    /// Before a tool runs.
    PreToolUse {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// Tool about to run.
        tool_name: String,
        /// Proposed tool input.
        tool_input: serde_json::Value,
    },

    /// After a tool ran.
    PostToolUse {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// Tool that ran.
        tool_name: String,
        /// Input the tool ran with.
        tool_input: serde_json::Value,
        /// What the tool produced.
        tool_response: serde_json::Value,
    },

    /// When the user submits a prompt.
    UserPromptSubmit {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// The submitted prompt.
        prompt: String,
    },

    /// Before the prompt is sent to the model.
    PrePrompt {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// Messages about to be sent.
        messages: Vec<serde_json::Value>,
    },

    /// After the prompt round-trip completed.
    PostPrompt {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// Messages that were sent.
        messages: Vec<serde_json::Value>,
        /// The model response.
        response: serde_json::Value,
    },

    /// Before the response is surfaced.
    PreResponse {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// The pending response.
        response: serde_json::Value,
    },

    /// After the response was surfaced.
    PostResponse {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// The surfaced response.
        response: serde_json::Value,
    },

    /// When the main agent stops.
    Stop {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// Whether a stop hook is already running.
        #[serde(default)]
        stop_hook_active: bool,
    },

    /// When a subagent stops.
    SubagentStop {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// Whether a stop hook is already running.
        #[serde(default)]
        stop_hook_active: bool,
    },

    /// Before a history compaction.
    PreCompact {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// `"manual"` or `"auto"`.
        trigger: String,
        /// Operator-supplied compaction instructions.
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_instructions: Option<String>,
    },

    /// After a history compaction.
    PostCompact {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// Token count after compaction.
        #[serde(default)]
        compacted_tokens: u64,
        /// Token count before compaction.
        #[serde(default)]
        original_tokens: u64,
        /// Achieved compression ratio.
        #[serde(default)]
        compression_ratio: f64,
    },

    /// When the Agent hits an error.
    OnError {
        /// Shared fields.
        #[serde(flatten)]
        base: HookInputBase,
        /// Error message.
        error: String,
        /// Error classification.
        #[serde(default)]
        error_type: String,
        /// Extra context.
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<serde_json::Value>,
    },
}

impl HookInput {
    /// Decode a hook input from the raw `hook_callback` payload
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// The event this input belongs to
    pub fn event(&self) -> HookEvent {
        match self {
            Self::PreToolUse { .. } => HookEvent::PreToolUse,
            Self::PostToolUse { .. } => HookEvent::PostToolUse,
            Self::UserPromptSubmit { .. } => HookEvent::UserPromptSubmit,
            Self::PrePrompt { .. } => HookEvent::PrePrompt,
            Self::PostPrompt { .. } => HookEvent::PostPrompt,
            Self::PreResponse { .. } => HookEvent::PreResponse,
            Self::PostResponse { .. } => HookEvent::PostResponse,
            Self::Stop { .. } => HookEvent::Stop,
            Self::SubagentStop { .. } => HookEvent::SubagentStop,
            Self::PreCompact { .. } => HookEvent::PreCompact,
            Self::PostCompact { .. } => HookEvent::PostCompact,
            Self::OnError { .. } => HookEvent::OnError,
        }
    }

    /// The shared base fields
    pub fn base(&self) -> &HookInputBase {
        match self {
            Self::PreToolUse { base, .. }
            | Self::PostToolUse { base, .. }
            | Self::UserPromptSubmit { base, .. }
            | Self::PrePrompt { base, .. }
            | Self::PostPrompt { base, .. }
            | Self::PreResponse { base, .. }
            | Self::PostResponse { base, .. }
            | Self::Stop { base, .. }
            | Self::SubagentStop { base, .. }
            | Self::PreCompact { base, .. }
            | Self::PostCompact { base, .. }
            | Self::OnError { base, .. } => base,
        }
    }
}

/// Event-specific hook output, nested under `hookSpecificOutput`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "hookEventName")]
pub enum HookSpecificOutput {
    /// PreToolUse: permission arbitration.
    PreToolUse {
        /// `"allow"`, `"deny"`, or `"ask"`.
        #[serde(rename = "permissionDecision", skip_serializing_if = "Option::is_none")]
        permission_decision: Option<String>,
        /// Why.
        #[serde(
            rename = "permissionDecisionReason",
            skip_serializing_if = "Option::is_none"
        )]
        permission_decision_reason: Option<String>,
        /// Replacement tool input.
        #[serde(rename = "updatedInput", skip_serializing_if = "Option::is_none")]
        updated_input: Option<serde_json::Value>,
    },

    /// PostToolUse: extra context for the model.
    PostToolUse {
        /// Context appended after the tool result.
        #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
        additional_context: Option<String>,
    },

    /// UserPromptSubmit: extra context for the model.
    UserPromptSubmit {
        /// Context appended to the prompt.
        #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
        additional_context: Option<String>,
    },

    /// PrePrompt: message rewriting.
    PrePrompt {
        /// Replacement message list.
        #[serde(rename = "modifiedMessages", skip_serializing_if = "Option::is_none")]
        modified_messages: Option<Vec<serde_json::Value>>,
        /// Extra context.
        #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
        additional_context: Option<String>,
    },

    /// PostPrompt: extra context.
    PostPrompt {
        /// Extra context.
        #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
        additional_context: Option<String>,
    },

    /// PreResponse: response rewriting.
    PreResponse {
        /// Replacement response.
        #[serde(rename = "modifiedResponse", skip_serializing_if = "Option::is_none")]
        modified_response: Option<serde_json::Value>,
    },

    /// PostResponse: extra context.
    PostResponse {
        /// Extra context.
        #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
        additional_context: Option<String>,
    },

    /// PostCompact: extra context.
    PostCompact {
        /// Extra context.
        #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
        additional_context: Option<String>,
    },

    /// OnError: recovery steering.
    OnError {
        /// `"retry"`, `"skip"`, or `"abort"`.
        #[serde(rename = "recoveryAction", skip_serializing_if = "Option::is_none")]
        recovery_action: Option<String>,
        /// Extra context.
        #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
        additional_context: Option<String>,
    },
}

/// Hook callback output
///
/// The sync shape carries control and decision fields; the async shape
/// defers execution back to the Agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum HookJsonOutput {
    /// Deferred execution.
    Async {
        /// Always `true`.
        #[serde(rename = "async")]
        is_async: bool,
        /// Deadline in milliseconds.
        #[serde(rename = "asyncTimeout", skip_serializing_if = "Option::is_none")]
        async_timeout: Option<u64>,
    },

    /// Synchronous decision.
    Sync {
        /// Whether the Agent should continue.
        #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
        continue_: Option<bool>,
        /// Hide output from the transcript.
        #[serde(rename = "suppressOutput", skip_serializing_if = "Option::is_none")]
        suppress_output: Option<bool>,
        /// Why execution stopped.
        #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
        /// `"block"` to block the event.
        #[serde(skip_serializing_if = "Option::is_none")]
        decision: Option<String>,
        /// Message surfaced to the user.
        #[serde(rename = "systemMessage", skip_serializing_if = "Option::is_none")]
        system_message: Option<String>,
        /// Feedback for the model, not shown to the user.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        /// Event-specific payload.
        #[serde(rename = "hookSpecificOutput", skip_serializing_if = "Option::is_none")]
        hook_specific_output: Option<HookSpecificOutput>,
    },
}

impl Default for HookJsonOutput {
    fn default() -> Self {
        Self::Sync {
            continue_: None,
            suppress_output: None,
            stop_reason: None,
            decision: None,
            system_message: None,
            reason: None,
            hook_specific_output: None,
        }
    }
}

impl HookJsonOutput {
    /// An empty "proceed" output
    pub fn proceed() -> Self {
        Self::default()
    }

    /// A blocking output with feedback for the model
    pub fn block(reason: impl Into<String>) -> Self {
        Self::Sync {
            continue_: None,
            suppress_output: None,
            stop_reason: None,
            decision: Some("block".to_string()),
            system_message: None,
            reason: Some(reason.into()),
            hook_specific_output: None,
        }
    }
}

/// A hook matcher: pattern plus position of the callbacks it owns
///
/// The pattern is forwarded verbatim to the Agent during `initialize`; the
/// Agent does the matching and fires `hook_callback` with the registered
/// callback ids.
#[derive(Debug, Clone, Default)]
pub struct HookMatcher {
    /// Tool-name pattern (e.g. `"Bash"`, `"Write|Edit"`); `None` matches all.
    pub matcher: Option<String>,
}

impl HookMatcher {
    /// Match every invocation of the event
    pub fn any() -> Self {
        Self::default()
    }

    /// Match tool names against a pattern
    pub fn tool(pattern: impl Into<String>) -> Self {
        Self {
            matcher: Some(pattern.into()),
        }
    }
}

/// Context handed to hook callbacks alongside the typed input
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    /// Tool invocation the hook is scoped to, if any.
    pub tool_use_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_names_are_stable() {
        assert_eq!(HookEvent::PreToolUse.as_str(), "PreToolUse");
        assert_eq!(HookEvent::ALL.len(), 12);
        for event in HookEvent::ALL {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.as_str()));
        }
    }

    #[test]
    fn pre_tool_use_input_decodes() {
        let input = HookInput::from_value(serde_json::json!({
            "hook_event_name": "PreToolUse",
            "session_id": "sess_1",
            "transcript_path": "/tmp/t.jsonl",
            "cwd": "/work",
            "tool_name": "Bash",
            "tool_input": {"command": "rm -rf /"}
        }))
        .unwrap();
        assert_eq!(input.event(), HookEvent::PreToolUse);
        assert_eq!(input.base().session_id, "sess_1");
        match input {
            HookInput::PreToolUse {
                tool_name,
                tool_input,
                ..
            } => {
                assert_eq!(tool_name, "Bash");
                assert_eq!(tool_input["command"], "rm -rf /");
            }
            other => panic!("expected PreToolUse, got {other:?}"),
        }
    }

    #[test]
    fn on_error_input_decodes() {
        let input = HookInput::from_value(serde_json::json!({
            "hook_event_name": "OnError",
            "session_id": "s",
            "transcript_path": "",
            "cwd": "",
            "error": "boom",
            "error_type": "tool_failure"
        }))
        .unwrap();
        assert_eq!(input.event(), HookEvent::OnError);
    }

    #[test]
    fn sync_output_uses_camel_case_keys() {
        let output = HookJsonOutput::Sync {
            continue_: Some(true),
            suppress_output: Some(false),
            stop_reason: None,
            decision: None,
            system_message: None,
            reason: None,
            hook_specific_output: Some(HookSpecificOutput::PreToolUse {
                permission_decision: Some("deny".to_string()),
                permission_decision_reason: Some("blocked by policy".to_string()),
                updated_input: None,
            }),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["continue"], true);
        assert_eq!(json["suppressOutput"], false);
        assert_eq!(json["hookSpecificOutput"]["hookEventName"], "PreToolUse");
        assert_eq!(json["hookSpecificOutput"]["permissionDecision"], "deny");
    }

    #[test]
    fn async_output_roundtrip() {
        let output = HookJsonOutput::Async {
            is_async: true,
            async_timeout: Some(5_000),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["async"], true);
        assert_eq!(json["asyncTimeout"], 5_000);
        let back: HookJsonOutput = serde_json::from_value(json).unwrap();
        assert_eq!(output, back);
    }

    #[test]
    fn block_helper_sets_decision() {
        let output = HookJsonOutput::block("nope");
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["decision"], "block");
        assert_eq!(json["reason"], "nope");
    }
}
