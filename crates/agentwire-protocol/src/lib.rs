//! Wire types for the agentwire Agent CLI protocol
//!
//! This crate defines the data model exchanged with the Agent CLI over
//! newline-delimited JSON: conversational messages, content blocks, control
//! request/response envelopes, hook types, and permission types. It is pure
//! data — no I/O, no runtime.
//!
//! # Type Organization
//!
//! - **Content**: [`content`] - text, thinking, tool use/result blocks
//! - **Messages**: [`message`] - user, assistant, system, result, stream_event
//! - **Control**: [`control`] - correlated control requests and responses
//! - **Hooks**: [`hooks`] - lifecycle event inputs and outputs
//! - **Permissions**: [`permissions`] - modes, results, dynamic updates

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod content;
pub mod control;
pub mod error;
pub mod hooks;
pub mod message;
pub mod permissions;

pub use content::{ContentBlock, ToolResultContent};
pub use control::{
    ControlRequestBody, ControlRequestEnvelope, ControlResponseBody, ControlResponseEnvelope,
    HookRegistration, InitializeRequest, RequestId,
};
pub use error::{ProtocolError, Result};
pub use hooks::{
    HookContext, HookEvent, HookInput, HookJsonOutput, HookMatcher, HookSpecificOutput,
};
pub use message::{
    AssistantErrorKind, AssistantMessage, Message, ResultMessage, StreamEventMessage,
    SystemMessage, UserContent, UserMessage,
};
pub use permissions::{
    PermissionBehavior, PermissionMode, PermissionResult, PermissionRuleValue, PermissionUpdate,
    PermissionUpdateDestination,
};
