//! Session configuration
//!
//! [`AgentOptions`] collects everything a session spawn needs: the tool
//! surface, system prompt, permission settings, session resumption, model
//! selection, MCP servers, callbacks, and raw flag passthrough. The
//! options compile to the Agent CLI's argv; external MCP servers are
//! written to a temporary config file that lives for the session.

use crate::callbacks::{HookMatcherConfig, PermissionCallback};
use crate::error::{AgentError, Result};
use crate::mcp::ToolServer;
use agentwire_protocol::hooks::HookEvent;
use agentwire_protocol::permissions::PermissionMode;
use agentwire_transport::{find_cli, StderrObserver};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// System prompt configuration: replace or extend the preset
#[derive(Debug, Clone)]
pub enum SystemPrompt {
    /// Replace the system prompt entirely.
    Text(String),
    /// Keep the named preset, optionally appending to it.
    Preset {
        /// Preset name (e.g. `claude_code`).
        preset: String,
        /// Text appended after the preset.
        append: Option<String>,
    },
}

/// Base tool surface: explicit names or a preset marker
///
/// Forwarded verbatim; which form the Agent CLI accepts is contractual
/// with the CLI, not with this SDK.
#[derive(Debug, Clone)]
pub enum ToolSpec {
    /// Explicit tool names; an empty list disables all built-in tools.
    Names(Vec<String>),
    /// A named preset.
    Preset(String),
}

/// Where the Agent loads settings from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    /// User-level settings.
    User,
    /// Project settings.
    Project,
    /// Local (gitignored) settings.
    Local,
}

impl SettingSource {
    fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Local => "local",
        }
    }
}

/// A custom subagent definition
#[derive(Debug, Clone, Serialize)]
pub struct AgentDefinition {
    /// What the agent is for.
    pub description: String,
    /// The agent's system prompt.
    pub prompt: String,
    /// Tools the agent may use; empty means inherit.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// Model override (`sonnet`, `opus`, `haiku`, `inherit`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// MCP server configuration
#[derive(Clone)]
pub enum McpServerConfig {
    /// External server on stdio.
    Stdio {
        /// Command to launch.
        command: String,
        /// Command arguments.
        args: Vec<String>,
        /// Environment for the server process.
        env: HashMap<String, String>,
    },
    /// External server over SSE.
    Sse {
        /// Server URL.
        url: String,
        /// Extra request headers.
        headers: HashMap<String, String>,
    },
    /// External server over HTTP.
    Http {
        /// Server URL.
        url: String,
        /// Extra request headers.
        headers: HashMap<String, String>,
    },
    /// In-process server hosted by this SDK.
    Sdk(Arc<ToolServer>),
}

impl McpServerConfig {
    fn external_value(&self) -> Option<serde_json::Value> {
        match self {
            Self::Stdio { command, args, env } => Some(serde_json::json!({
                "type": "stdio",
                "command": command,
                "args": args,
                "env": env,
            })),
            Self::Sse { url, headers } => Some(serde_json::json!({
                "type": "sse",
                "url": url,
                "headers": headers,
            })),
            Self::Http { url, headers } => Some(serde_json::json!({
                "type": "http",
                "url": url,
                "headers": headers,
            })),
            Self::Sdk(_) => None,
        }
    }
}

/// Configuration for a session or one-shot query
#[derive(Clone, Default)]
pub struct AgentOptions {
    /// Explicit CLI path; discovered when unset.
    pub cli_path: Option<String>,

    /// Base tool surface.
    pub tools: Option<ToolSpec>,

    /// Tools pre-approved for use.
    pub allowed_tools: Vec<String>,

    /// Tools blocked outright.
    pub disallowed_tools: Vec<String>,

    /// System prompt configuration.
    pub system_prompt: Option<SystemPrompt>,

    /// MCP servers by name.
    pub mcp_servers: HashMap<String, McpServerConfig>,

    /// Global permission mode.
    pub permission_mode: Option<PermissionMode>,

    /// Tool the Agent should use for permission prompts.
    pub permission_prompt_tool_name: Option<String>,

    /// Continue the most recent conversation.
    pub continue_conversation: bool,

    /// Resume a session by id.
    pub resume: Option<String>,

    /// Fork when resuming instead of continuing in place.
    pub fork_session: bool,

    /// Model for this session.
    pub model: Option<String>,

    /// Fallback model when the primary is unavailable.
    pub fallback_model: Option<String>,

    /// Cap on agentic turns per query.
    pub max_turns: Option<u32>,

    /// Cap on extended-thinking tokens.
    pub max_thinking_tokens: Option<u32>,

    /// Settings file path.
    pub settings: Option<String>,

    /// Which setting scopes to load.
    pub setting_sources: Option<Vec<SettingSource>>,

    /// Extra directories the Agent may access.
    pub add_dirs: Vec<PathBuf>,

    /// Plugin directories.
    pub plugin_dirs: Vec<PathBuf>,

    /// Custom subagent definitions.
    pub agents: HashMap<String, AgentDefinition>,

    /// Environment overlaid on the CLI process.
    pub env: HashMap<String, String>,

    /// Working directory for the CLI process.
    pub cwd: Option<PathBuf>,

    /// Arbitrary `--key [value]` passthrough.
    pub extra_args: HashMap<String, Option<String>>,

    /// Cap on a single buffered stdout line.
    pub max_buffer_size: Option<usize>,

    /// Capacity of the transport message ring.
    pub message_channel_capacity: Option<usize>,

    /// Deliver partial-message stream events.
    pub include_partial_messages: bool,

    /// Ask the CLI to mirror debug logging to stderr.
    pub debug_to_stderr: bool,

    /// Enable file checkpointing so turns can be rewound.
    pub enable_file_checkpointing: bool,

    /// Structured output schema for results.
    pub output_format: Option<serde_json::Value>,

    /// Caller identity forwarded to the CLI.
    pub user: Option<String>,

    /// Permission callback for `can_use_tool`.
    pub can_use_tool: Option<PermissionCallback>,

    /// Hook callbacks by event.
    pub hooks: HashMap<HookEvent, Vec<HookMatcherConfig>>,

    /// Stderr line observer.
    pub stderr: Option<StderrObserver>,
}

impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("cli_path", &self.cli_path)
            .field("model", &self.model)
            .field("permission_mode", &self.permission_mode)
            .field("resume", &self.resume)
            .field("mcp_servers", &self.mcp_servers.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("has_can_use_tool", &self.can_use_tool.is_some())
            .finish()
    }
}

impl AgentOptions {
    /// Options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CLI path
    pub fn with_cli_path(mut self, path: impl Into<String>) -> Self {
        self.cli_path = Some(path.into());
        self
    }

    /// Set the base tool surface
    pub fn with_tools(mut self, tools: ToolSpec) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the allowed tools
    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set the disallowed tools
    pub fn with_disallowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(SystemPrompt::Text(prompt.into()));
        self
    }

    /// Append to the preset system prompt
    pub fn with_appended_system_prompt(mut self, append: impl Into<String>) -> Self {
        self.system_prompt = Some(SystemPrompt::Preset {
            preset: "claude_code".to_string(),
            append: Some(append.into()),
        });
        self
    }

    /// Register an MCP server
    pub fn with_mcp_server(mut self, name: impl Into<String>, config: McpServerConfig) -> Self {
        self.mcp_servers.insert(name.into(), config);
        self
    }

    /// Register an in-process tool server
    pub fn with_tool_server(mut self, server: ToolServer) -> Self {
        let name = server.name().to_string();
        self.mcp_servers
            .insert(name, McpServerConfig::Sdk(Arc::new(server)));
        self
    }

    /// Set the permission mode
    pub fn with_permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = Some(mode);
        self
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the fallback model
    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = Some(model.into());
        self
    }

    /// Cap the number of agentic turns
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Continue the most recent conversation
    pub fn with_continue_conversation(mut self) -> Self {
        self.continue_conversation = true;
        self
    }

    /// Resume a session by id
    pub fn with_resume(mut self, session_id: impl Into<String>) -> Self {
        self.resume = Some(session_id.into());
        self
    }

    /// Fork when resuming
    pub fn with_fork_session(mut self) -> Self {
        self.fork_session = true;
        self
    }

    /// Set the settings file
    pub fn with_settings(mut self, path: impl Into<String>) -> Self {
        self.settings = Some(path.into());
        self
    }

    /// Set the setting sources
    pub fn with_setting_sources(mut self, sources: Vec<SettingSource>) -> Self {
        self.setting_sources = Some(sources);
        self
    }

    /// Grant access to an extra directory
    pub fn with_add_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.add_dirs.push(dir.into());
        self
    }

    /// Add a plugin directory
    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dirs.push(dir.into());
        self
    }

    /// Define a custom subagent
    pub fn with_agent(mut self, name: impl Into<String>, agent: AgentDefinition) -> Self {
        self.agents.insert(name.into(), agent);
        self
    }

    /// Overlay an environment variable on the CLI process
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the CLI working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Pass a raw flag through to the CLI
    pub fn with_extra_arg(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.extra_args.insert(key.into(), value);
        self
    }

    /// Cap a single buffered stdout line
    pub fn with_max_buffer_size(mut self, bytes: usize) -> Self {
        self.max_buffer_size = Some(bytes);
        self
    }

    /// Set the transport message ring capacity
    pub fn with_message_channel_capacity(mut self, capacity: usize) -> Self {
        self.message_channel_capacity = Some(capacity);
        self
    }

    /// Deliver partial-message stream events
    pub fn with_partial_messages(mut self) -> Self {
        self.include_partial_messages = true;
        self
    }

    /// Enable file checkpointing
    pub fn with_file_checkpointing(mut self) -> Self {
        self.enable_file_checkpointing = true;
        self
    }

    /// Set the caller identity
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Constrain results to a structured output schema
    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_format = Some(serde_json::json!({
            "type": "json_schema",
            "schema": schema,
        }));
        self
    }

    /// Register the permission callback
    pub fn with_can_use_tool(mut self, callback: PermissionCallback) -> Self {
        self.can_use_tool = Some(callback);
        self
    }

    /// Register hook callbacks for an event
    pub fn with_hook(mut self, event: HookEvent, matcher: HookMatcherConfig) -> Self {
        self.hooks.entry(event).or_default().push(matcher);
        self
    }

    /// Register the stderr observer
    pub fn with_stderr(mut self, observer: StderrObserver) -> Self {
        self.stderr = Some(observer);
        self
    }

    /// Resolve the CLI binary for these options
    pub fn resolve_cli(&self) -> Result<PathBuf> {
        Ok(find_cli(self.cli_path.as_deref())?)
    }

    /// In-process servers registered in `mcp_servers`
    pub fn sdk_servers(&self) -> HashMap<String, Arc<ToolServer>> {
        self.mcp_servers
            .iter()
            .filter_map(|(name, config)| match config {
                McpServerConfig::Sdk(server) => Some((name.clone(), Arc::clone(server))),
                _ => None,
            })
            .collect()
    }

    /// Write external MCP servers to a temporary config file
    ///
    /// Returns `None` when every configured server is in-process. The file
    /// is deleted when the returned handle drops, on session close.
    pub fn write_mcp_config(&self) -> Result<Option<NamedTempFile>> {
        let external: serde_json::Map<String, serde_json::Value> = self
            .mcp_servers
            .iter()
            .filter_map(|(name, config)| {
                config.external_value().map(|value| (name.clone(), value))
            })
            .collect();
        if external.is_empty() {
            return Ok(None);
        }

        let file = NamedTempFile::new()
            .map_err(|e| AgentError::Config(format!("failed to create MCP config file: {e}")))?;
        let config = serde_json::json!({ "mcpServers": external });
        std::fs::write(file.path(), serde_json::to_vec_pretty(&config).unwrap_or_default())
            .map_err(|e| AgentError::Config(format!("failed to write MCP config file: {e}")))?;
        Ok(Some(file))
    }

    /// Compile the options into the CLI argv
    pub fn build_argv(&self, mcp_config_path: Option<&Path>) -> Vec<String> {
        let mut argv: Vec<String> = vec![
            "--output-format".into(),
            "stream-json".into(),
            "--input-format".into(),
            "stream-json".into(),
            "--verbose".into(),
        ];

        match &self.system_prompt {
            Some(SystemPrompt::Text(text)) => {
                argv.push("--system-prompt".into());
                argv.push(text.clone());
            }
            Some(SystemPrompt::Preset { append, .. }) => {
                if let Some(append) = append {
                    argv.push("--append-system-prompt".into());
                    argv.push(append.clone());
                }
            }
            None => {}
        }

        match &self.tools {
            Some(ToolSpec::Names(names)) => {
                argv.push("--tools".into());
                argv.push(names.join(","));
            }
            Some(ToolSpec::Preset(preset)) => {
                argv.push("--tools".into());
                argv.push(
                    serde_json::json!({"type": "preset", "preset": preset}).to_string(),
                );
            }
            None => {}
        }

        if !self.allowed_tools.is_empty() {
            argv.push("--allowedTools".into());
            argv.push(self.allowed_tools.join(","));
        }
        if !self.disallowed_tools.is_empty() {
            argv.push("--disallowedTools".into());
            argv.push(self.disallowed_tools.join(","));
        }

        if let Some(model) = &self.model {
            argv.push("--model".into());
            argv.push(model.clone());
        }
        if let Some(model) = &self.fallback_model {
            argv.push("--fallback-model".into());
            argv.push(model.clone());
        }
        if let Some(max_turns) = self.max_turns {
            argv.push("--max-turns".into());
            argv.push(max_turns.to_string());
        }
        if let Some(max_thinking) = self.max_thinking_tokens {
            argv.push("--max-thinking-tokens".into());
            argv.push(max_thinking.to_string());
        }

        if let Some(mode) = self.permission_mode {
            argv.push("--permission-mode".into());
            argv.push(mode.as_str().into());
        }
        if let Some(tool) = &self.permission_prompt_tool_name {
            argv.push("--permission-prompt-tool".into());
            argv.push(tool.clone());
        }

        if self.continue_conversation {
            argv.push("--continue".into());
        }
        if let Some(session_id) = &self.resume {
            argv.push("--resume".into());
            argv.push(session_id.clone());
        }
        if self.fork_session {
            argv.push("--fork-session".into());
        }
        if self.include_partial_messages {
            argv.push("--include-partial-messages".into());
        }
        if self.enable_file_checkpointing {
            argv.push("--enable-file-checkpointing".into());
        }
        if self.debug_to_stderr {
            argv.push("--debug-to-stderr".into());
        }

        if let Some(settings) = &self.settings {
            argv.push("--settings".into());
            argv.push(settings.clone());
        }
        if let Some(sources) = &self.setting_sources {
            argv.push("--setting-sources".into());
            argv.push(
                sources
                    .iter()
                    .map(SettingSource::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
        for dir in &self.add_dirs {
            argv.push("--add-dir".into());
            argv.push(dir.display().to_string());
        }
        for dir in &self.plugin_dirs {
            argv.push("--plugin-dir".into());
            argv.push(dir.display().to_string());
        }

        if let Some(path) = mcp_config_path {
            argv.push("--mcp-servers".into());
            argv.push(path.display().to_string());
        }

        if !self.agents.is_empty() {
            argv.push("--agents".into());
            argv.push(serde_json::to_string(&self.agents).unwrap_or_default());
        }

        if let Some(format) = &self.output_format {
            argv.push("--output-format-schema".into());
            argv.push(format.to_string());
        }
        if let Some(user) = &self.user {
            argv.push("--user".into());
            argv.push(user.clone());
        }

        // Deterministic order for the raw passthrough.
        let mut extra: Vec<_> = self.extra_args.iter().collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in extra {
            argv.push(format!("--{key}"));
            if let Some(value) = value {
                argv.push(value.clone());
            }
        }

        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_argv_is_stream_json() {
        let argv = AgentOptions::new().build_argv(None);
        assert_eq!(
            &argv[..5],
            &[
                "--output-format",
                "stream-json",
                "--input-format",
                "stream-json",
                "--verbose"
            ]
        );
    }

    #[test]
    fn argv_carries_configured_flags() {
        let options = AgentOptions::new()
            .with_system_prompt("You are terse.")
            .with_model("test-model")
            .with_fallback_model("test-fallback")
            .with_allowed_tools(["Read", "Grep"])
            .with_disallowed_tools(["Bash"])
            .with_max_turns(4)
            .with_permission_mode(PermissionMode::AcceptEdits)
            .with_resume("sess_7")
            .with_fork_session()
            .with_partial_messages()
            .with_settings("/tmp/settings.json")
            .with_setting_sources(vec![SettingSource::User, SettingSource::Project])
            .with_add_dir("/data/a")
            .with_add_dir("/data/b")
            .with_extra_arg("region", Some("us".into()))
            .with_extra_arg("trace", None);

        let argv = options.build_argv(Some(Path::new("/tmp/mcp.json")));
        let joined = argv.join(" ");
        assert!(joined.contains("--system-prompt You are terse."));
        assert!(joined.contains("--model test-model"));
        assert!(joined.contains("--fallback-model test-fallback"));
        assert!(joined.contains("--allowedTools Read,Grep"));
        assert!(joined.contains("--disallowedTools Bash"));
        assert!(joined.contains("--max-turns 4"));
        assert!(joined.contains("--permission-mode acceptEdits"));
        assert!(joined.contains("--resume sess_7"));
        assert!(joined.contains("--fork-session"));
        assert!(joined.contains("--include-partial-messages"));
        assert!(joined.contains("--settings /tmp/settings.json"));
        assert!(joined.contains("--setting-sources user,project"));
        assert!(joined.contains("--add-dir /data/a"));
        assert!(joined.contains("--add-dir /data/b"));
        assert!(joined.contains("--mcp-servers /tmp/mcp.json"));
        assert!(joined.contains("--region us"));
        assert!(joined.contains("--trace"));
        assert!(!joined.contains("--trace "));
    }

    #[test]
    fn empty_tool_list_still_emits_the_flag() {
        let argv = AgentOptions::new()
            .with_tools(ToolSpec::Names(vec![]))
            .build_argv(None);
        let pos = argv.iter().position(|a| a == "--tools").unwrap();
        assert_eq!(argv[pos + 1], "");
    }

    #[test]
    fn preset_tools_forward_as_json() {
        let argv = AgentOptions::new()
            .with_tools(ToolSpec::Preset("claude_code".into()))
            .build_argv(None);
        let pos = argv.iter().position(|a| a == "--tools").unwrap();
        let value: serde_json::Value = serde_json::from_str(&argv[pos + 1]).unwrap();
        assert_eq!(value["type"], "preset");
        assert_eq!(value["preset"], "claude_code");
    }

    #[test]
    fn mcp_config_only_contains_external_servers() {
        let options = AgentOptions::new()
            .with_mcp_server(
                "files",
                McpServerConfig::Stdio {
                    command: "mcp-files".into(),
                    args: vec!["--root".into(), "/tmp".into()],
                    env: HashMap::new(),
                },
            )
            .with_mcp_server(
                "web",
                McpServerConfig::Sse {
                    url: "https://example.com/sse".into(),
                    headers: HashMap::new(),
                },
            )
            .with_tool_server(ToolServer::new("calc", "1.0.0"));

        let file = options.write_mcp_config().unwrap().expect("external servers");
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(file.path()).unwrap()).unwrap();
        let servers = written["mcpServers"].as_object().unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers["files"]["type"], "stdio");
        assert_eq!(servers["files"]["command"], "mcp-files");
        assert_eq!(servers["web"]["type"], "sse");
        assert!(!servers.contains_key("calc"));

        assert_eq!(options.sdk_servers().len(), 1);
    }

    #[test]
    fn sdk_only_servers_need_no_config_file() {
        let options = AgentOptions::new().with_tool_server(ToolServer::new("calc", "1.0.0"));
        assert!(options.write_mcp_config().unwrap().is_none());
    }

    #[test]
    fn agents_serialize_to_json_flag() {
        let options = AgentOptions::new().with_agent(
            "reviewer",
            AgentDefinition {
                description: "Reviews code".into(),
                prompt: "You review code.".into(),
                tools: vec!["Read".into()],
                model: Some("sonnet".into()),
            },
        );
        let argv = options.build_argv(None);
        let pos = argv.iter().position(|a| a == "--agents").unwrap();
        let value: serde_json::Value = serde_json::from_str(&argv[pos + 1]).unwrap();
        assert_eq!(value["reviewer"]["model"], "sonnet");
    }
}
