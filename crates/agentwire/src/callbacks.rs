//! Callback dispatch for peer-initiated control requests
//!
//! The Agent initiates three request kinds: `can_use_tool` (permission
//! arbitration), `hook_callback` (lifecycle hooks), and `mcp_message`
//! (in-process tool servers). Handlers registered here are invoked on their
//! own tasks by the protocol core; a handler failure becomes an error
//! control response, never a transport failure.

use crate::error::Result;
use crate::mcp::ToolServer;
use agentwire_protocol::control::{ControlRequestBody, HookRegistration, InitializeRequest};
use agentwire_protocol::hooks::{HookContext, HookEvent, HookInput, HookJsonOutput, HookMatcher};
use agentwire_protocol::permissions::{PermissionMode, PermissionResult, PermissionUpdate};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A `can_use_tool` request handed to the permission callback
#[derive(Debug, Clone)]
pub struct ToolPermissionRequest {
    /// Tool about to run.
    pub tool_name: String,

    /// Proposed tool input.
    pub input: Value,

    /// Permission updates the Agent suggests granting.
    pub suggestions: Vec<PermissionUpdate>,

    /// Path that triggered the check, if any.
    pub blocked_path: Option<String>,

    /// Cancellation signal; fires when the session closes.
    pub signal: CancellationToken,
}

/// Permission callback: decide whether a tool may run
pub type PermissionCallback = Arc<
    dyn Fn(ToolPermissionRequest) -> BoxFuture<'static, Result<PermissionResult>> + Send + Sync,
>;

/// Hook callback: react to a lifecycle event
pub type HookCallback =
    Arc<dyn Fn(HookInput, HookContext) -> BoxFuture<'static, Result<HookJsonOutput>> + Send + Sync>;

/// A hook matcher paired with its callbacks, as configured by the caller
#[derive(Clone)]
pub struct HookMatcherConfig {
    /// The matcher forwarded to the Agent.
    pub matcher: HookMatcher,

    /// Callbacks fired when the matcher hits.
    pub hooks: Vec<HookCallback>,
}

impl HookMatcherConfig {
    /// Pair a matcher with callbacks
    pub fn new(matcher: HookMatcher, hooks: Vec<HookCallback>) -> Self {
        Self { matcher, hooks }
    }
}

/// Registered handler tables for peer-initiated control requests
///
/// Tool names, server names, and hook callback ids are stable for the
/// lifetime of a session.
pub struct CallbackRegistry {
    permission: Option<PermissionCallback>,
    hooks: HashMap<String, HookCallback>,
    registrations: HashMap<String, Vec<HookRegistration>>,
    servers: HashMap<String, Arc<ToolServer>>,
    mode: Mutex<PermissionMode>,
    cancel: CancellationToken,
}

impl CallbackRegistry {
    /// Build the registry from configured callbacks
    pub fn new(
        permission: Option<PermissionCallback>,
        hook_config: HashMap<HookEvent, Vec<HookMatcherConfig>>,
        servers: HashMap<String, Arc<ToolServer>>,
        mode: PermissionMode,
    ) -> Self {
        let mut hooks = HashMap::new();
        let mut registrations: HashMap<String, Vec<HookRegistration>> = HashMap::new();

        // Callback ids are assigned in registration order and stay stable
        // for the session; the Agent echoes them back in hook_callback.
        let mut next_id = 0usize;
        for (event, matchers) in hook_config {
            let mut event_registrations = Vec::new();
            for config in matchers {
                let mut ids = Vec::new();
                for hook in config.hooks {
                    let id = format!("hook_{next_id}");
                    next_id += 1;
                    hooks.insert(id.clone(), hook);
                    ids.push(id);
                }
                event_registrations.push(HookRegistration {
                    matcher: config.matcher.matcher.clone(),
                    hook_callback_ids: ids,
                });
            }
            registrations.insert(event.as_str().to_string(), event_registrations);
        }

        Self {
            permission,
            hooks,
            registrations,
            servers,
            mode: Mutex::new(mode),
            cancel: CancellationToken::new(),
        }
    }

    /// An empty registry with the default permission mode
    pub fn empty() -> Self {
        Self::new(None, HashMap::new(), HashMap::new(), PermissionMode::default())
    }

    /// The `initialize` body advertising registered hooks
    pub fn initialize_request(&self) -> InitializeRequest {
        InitializeRequest {
            hooks: if self.registrations.is_empty() {
                None
            } else {
                Some(self.registrations.clone())
            },
        }
    }

    /// Whether any in-process servers are registered
    pub fn has_servers(&self) -> bool {
        !self.servers.is_empty()
    }

    /// Note a permission mode change
    pub async fn set_mode(&self, mode: PermissionMode) {
        *self.mode.lock().await = mode;
    }

    /// The currently noted permission mode
    pub async fn mode(&self) -> PermissionMode {
        *self.mode.lock().await
    }

    /// Cancellation token handed to every callback
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel all outstanding callbacks (fired on session close)
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    /// Dispatch a peer-initiated control request body
    ///
    /// Returns the success payload, or an error message for the error
    /// control response. Runs on its own task, never on the reader.
    pub async fn dispatch(
        &self,
        body: ControlRequestBody,
    ) -> std::result::Result<Option<Value>, String> {
        match body {
            ControlRequestBody::CanUseTool {
                tool_name,
                input,
                permission_suggestions,
                blocked_path,
            } => {
                let result = self
                    .check_permission(tool_name, input, permission_suggestions, blocked_path)
                    .await?;
                Ok(Some(result.to_response_value()))
            }

            ControlRequestBody::HookCallback {
                callback_id,
                input,
                tool_use_id,
            } => {
                let Some(hook) = self.hooks.get(&callback_id) else {
                    return Err(format!("unknown hook callback id: {callback_id}"));
                };
                let input = HookInput::from_value(input)
                    .map_err(|e| format!("malformed hook input: {e}"))?;
                let ctx = HookContext { tool_use_id };
                let output = hook(input, ctx).await.map_err(|e| e.to_string())?;
                let value = serde_json::to_value(&output)
                    .map_err(|e| format!("hook output serialization failed: {e}"))?;
                Ok(Some(value))
            }

            ControlRequestBody::McpMessage {
                server_name,
                message,
            } => {
                let Some(server) = self.servers.get(&server_name) else {
                    // Method-not-found travels inside the JSON-RPC payload,
                    // the control response itself still succeeds.
                    let id = message.get("id").cloned();
                    let response = crate::mcp::error_response(
                        id,
                        crate::mcp::ERROR_METHOD_NOT_FOUND,
                        format!("server not found: {server_name}"),
                    );
                    return Ok(Some(serde_json::json!({ "mcp_response": response })));
                };
                let response = server.handle_message(message).await;
                Ok(Some(serde_json::json!({ "mcp_response": response })))
            }

            other => Err(format!(
                "unsupported control request subtype: {}",
                other.subtype()
            )),
        }
    }

    async fn check_permission(
        &self,
        tool_name: String,
        input: Value,
        suggestions: Option<Vec<PermissionUpdate>>,
        blocked_path: Option<String>,
    ) -> std::result::Result<PermissionResult, String> {
        let Some(callback) = &self.permission else {
            // No callback registered: allow only under bypassPermissions.
            return if self.mode().await == PermissionMode::BypassPermissions {
                debug!(tool = %tool_name, "no permission handler, bypass mode allows");
                Ok(PermissionResult::allow())
            } else {
                Ok(PermissionResult::deny("no permission handler"))
            };
        };

        let request = ToolPermissionRequest {
            tool_name,
            input,
            suggestions: suggestions.unwrap_or_default(),
            blocked_path,
            signal: self.cancel.child_token(),
        };
        callback(request).await.map_err(|e| e.to_string())
    }
}

/// Convenience constructor for boxed permission callbacks
pub fn permission_callback<F, Fut>(f: F) -> PermissionCallback
where
    F: Fn(ToolPermissionRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<PermissionResult>> + Send + 'static,
{
    use futures::FutureExt;
    Arc::new(move |request| f(request).boxed())
}

/// Convenience constructor for boxed hook callbacks
pub fn hook_callback<F, Fut>(f: F) -> HookCallback
where
    F: Fn(HookInput, HookContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<HookJsonOutput>> + Send + 'static,
{
    use futures::FutureExt;
    Arc::new(move |input, ctx| f(input, ctx).boxed())
}
