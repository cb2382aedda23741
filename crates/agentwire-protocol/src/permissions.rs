//! Permission types
//!
//! Covers the global permission mode, the per-call result of a
//! `can_use_tool` check, and the dynamic permission updates that can ride
//! along with an allow result or arrive as CLI suggestions.

use serde::{Deserialize, Serialize};

/// The Agent's global policy for tool-use approval
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Prompt on anything not covered by rules.
    #[default]
    Default,
    /// Auto-approve file edits.
    AcceptEdits,
    /// Plan mode: read-only exploration.
    Plan,
    /// Approve everything without asking.
    BypassPermissions,
}

impl PermissionMode {
    /// The wire name of this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

/// Behavior attached to a permission rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PermissionBehavior {
    /// Allow the matched action.
    Allow,
    /// Deny the matched action.
    Deny,
    /// Ask the user.
    Ask,
}

/// Where a permission update is persisted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionUpdateDestination {
    /// User-level settings.
    UserSettings,
    /// Project settings.
    ProjectSettings,
    /// Local (gitignored) settings.
    LocalSettings,
    /// This session only.
    Session,
}

/// A single permission rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionRuleValue {
    /// Tool the rule applies to.
    #[serde(rename = "toolName")]
    pub tool_name: String,

    /// Optional rule constraint (e.g. a command pattern).
    #[serde(rename = "ruleContent", skip_serializing_if = "Option::is_none")]
    pub rule_content: Option<String>,
}

impl PermissionRuleValue {
    /// Create a rule for a tool
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            rule_content: None,
        }
    }

    /// Attach a rule constraint
    pub fn with_rule_content(mut self, content: impl Into<String>) -> Self {
        self.rule_content = Some(content.into());
        self
    }
}

/// A dynamic permission change, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PermissionUpdate {
    /// Add rules with a behavior.
    AddRules {
        /// Rules to add.
        rules: Vec<PermissionRuleValue>,
        /// Behavior for the rules.
        behavior: PermissionBehavior,
        /// Where to persist.
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Replace the rule set.
    ReplaceRules {
        /// Replacement rules.
        rules: Vec<PermissionRuleValue>,
        /// Behavior for the rules.
        behavior: PermissionBehavior,
        /// Where to persist.
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Remove rules.
    RemoveRules {
        /// Rules to remove.
        rules: Vec<PermissionRuleValue>,
        /// Where to persist.
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Switch the permission mode.
    SetMode {
        /// The new mode.
        mode: PermissionMode,
        /// Where to persist.
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Grant access to directories.
    AddDirectories {
        /// Directories to add.
        directories: Vec<String>,
        /// Where to persist.
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Revoke access to directories.
    RemoveDirectories {
        /// Directories to remove.
        directories: Vec<String>,
        /// Where to persist.
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
}

/// Outcome of a `can_use_tool` permission check
///
/// This is a value, not an error: a deny is a normal reply to the CLI.
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionResult {
    /// Let the tool run.
    Allow {
        /// Replacement input, when the callback rewrote it.
        updated_input: Option<serde_json::Value>,
        /// Permission updates to apply alongside the allow.
        updated_permissions: Option<Vec<PermissionUpdate>>,
    },
    /// Block the tool.
    Deny {
        /// Reason shown to the model.
        message: String,
        /// Whether to also interrupt the turn.
        interrupt: bool,
    },
}

impl PermissionResult {
    /// A plain allow
    pub fn allow() -> Self {
        Self::Allow {
            updated_input: None,
            updated_permissions: None,
        }
    }

    /// An allow that rewrites the tool input
    pub fn allow_with_input(updated_input: serde_json::Value) -> Self {
        Self::Allow {
            updated_input: Some(updated_input),
            updated_permissions: None,
        }
    }

    /// A plain deny with a message
    pub fn deny(message: impl Into<String>) -> Self {
        Self::Deny {
            message: message.into(),
            interrupt: false,
        }
    }

    /// Encode as the `can_use_tool` control response payload
    pub fn to_response_value(&self) -> serde_json::Value {
        match self {
            Self::Allow {
                updated_input,
                updated_permissions,
            } => {
                let mut obj = serde_json::Map::new();
                obj.insert("behavior".into(), "allow".into());
                if let Some(input) = updated_input {
                    obj.insert("updated_input".into(), input.clone());
                }
                if let Some(updates) = updated_permissions {
                    obj.insert(
                        "updated_permissions".into(),
                        serde_json::to_value(updates).unwrap_or_default(),
                    );
                }
                serde_json::Value::Object(obj)
            }
            Self::Deny { message, interrupt } => serde_json::json!({
                "behavior": "deny",
                "message": message,
                "interrupt": interrupt,
            }),
        }
    }
}
