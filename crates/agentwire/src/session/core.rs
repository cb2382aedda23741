//! Session creation, turns, and shutdown

use crate::callbacks::CallbackRegistry;
use crate::error::Result;
use crate::options::AgentOptions;
use crate::routing::ProtocolRouter;
use agentwire_protocol::content::ContentBlock;
use agentwire_protocol::control::ControlRequestBody;
use agentwire_protocol::message::Message;
use agentwire_transport::{skip_version_check, ProcessConfig, SubprocessTransport};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Deadline for the `initialize` handshake
const INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the consumer message channel
const SESSION_CHANNEL_CAPACITY: usize = 10;

/// A stateful conversation with the Agent CLI
///
/// Single-owner: the session assumes one logical sender and one logical
/// receiver. Drain [`Session::receive_response`] to the turn's `result`
/// before sending the next turn. For sharing across workers, wrap in
/// [`super::SharedSession`].
pub struct Session {
    pub(crate) router: Arc<ProtocolRouter>,
    pub(crate) message_rx: mpsc::Receiver<Result<Message>>,
    /// Keeps the synthesized MCP config alive; deleted on drop.
    mcp_config: Option<NamedTempFile>,
    /// Response body of the `initialize` handshake, if the CLI sent one.
    init_info: Option<serde_json::Value>,
}

impl Session {
    /// Spawn the Agent CLI and perform the `initialize` handshake
    pub async fn connect(options: AgentOptions) -> Result<Self> {
        let capacity = options
            .message_channel_capacity
            .unwrap_or(SESSION_CHANNEL_CAPACITY);
        Self::connect_with_capacity(options, capacity).await
    }

    pub(crate) async fn connect_with_capacity(
        options: AgentOptions,
        consumer_capacity: usize,
    ) -> Result<Self> {
        let cli_path = options.resolve_cli()?;

        if !skip_version_check(&options.env) {
            probe_cli_version(&cli_path).await;
        }

        let mcp_config = options.write_mcp_config()?;
        let argv = options.build_argv(mcp_config.as_ref().map(|f| f.path()));

        let mut process_config = ProcessConfig::new(cli_path).with_args(argv);
        process_config.env = options.env.clone();
        process_config.cwd = options.cwd.clone();
        if let Some(cap) = options.max_buffer_size {
            process_config.max_line_len = cap;
        }
        if let Some(capacity) = options.message_channel_capacity {
            process_config.channel_capacity = capacity;
        }
        process_config.stderr_observer = options.stderr.clone();

        let callbacks = Arc::new(CallbackRegistry::new(
            options.can_use_tool.clone(),
            options.hooks.clone(),
            options.sdk_servers(),
            options.permission_mode.unwrap_or_default(),
        ));

        let transport = SubprocessTransport::spawn(process_config)?;
        let (router, message_rx) = ProtocolRouter::start(
            transport,
            Arc::clone(&callbacks),
            consumer_capacity,
            options.include_partial_messages,
        );
        let router = Arc::new(router);

        // Handshake: advertise hook registrations, record what the CLI
        // reports back as session metadata.
        let init_body = ControlRequestBody::Initialize(callbacks.initialize_request());
        let init_info = match router.send_control(init_body, Some(INIT_TIMEOUT)).await {
            Ok(info) => info,
            Err(e) => {
                let _ = router.shutdown().await;
                return Err(e);
            }
        };
        debug!(has_init_info = init_info.is_some(), "session connected");

        Ok(Self {
            router,
            message_rx,
            mcp_config,
            init_info,
        })
    }

    /// Assemble a session from an already-running router (test support)
    pub(crate) fn from_parts(
        router: Arc<ProtocolRouter>,
        message_rx: mpsc::Receiver<Result<Message>>,
    ) -> Self {
        Self {
            router,
            message_rx,
            mcp_config: None,
            init_info: None,
        }
    }

    /// Metadata the CLI returned from the `initialize` handshake
    pub fn init_info(&self) -> Option<&serde_json::Value> {
        self.init_info.as_ref()
    }

    /// Send one user turn as prompt text
    pub async fn send_turn(&self, prompt: impl Into<String>) -> Result<()> {
        self.router
            .write_user_turn(&serde_json::Value::String(prompt.into()))
            .await
    }

    /// Send one user turn as content blocks
    ///
    /// An empty block list is accepted and forwarded verbatim.
    pub async fn send_turn_content(&self, blocks: Vec<ContentBlock>) -> Result<()> {
        let content = serde_json::to_value(&blocks)
            .map_err(|e| crate::error::AgentError::Protocol(format!("bad content: {e}")))?;
        self.router.write_user_turn(&content).await
    }

    /// Stream the messages of the current turn, ending at its `result`
    ///
    /// The stream yields parse failures as error items without ending the
    /// turn; the turn ends at the first `result` message or when the
    /// session's channel closes. Dropping the stream detaches the consumer
    /// without closing the session.
    pub fn receive_response(&mut self) -> ResponseStream<'_> {
        ResponseStream {
            rx: &mut self.message_rx,
            done: false,
        }
    }

    /// Receive the next message without turn framing
    pub async fn next_message(&mut self) -> Option<Result<Message>> {
        self.message_rx.recv().await
    }

    /// Close the session: terminate the CLI and fail pending waiters
    pub async fn close(&mut self) -> Result<()> {
        let result = self.router.shutdown().await;
        // Release the temp MCP config now rather than at drop.
        if let Some(file) = self.mcp_config.take() {
            if let Err(e) = file.close() {
                warn!(error = %e, "failed to remove MCP config file");
            }
        }
        result
    }
}

/// Best-effort CLI version probe, skipped under
/// `CLAUDE_AGENT_SDK_SKIP_VERSION_CHECK`
async fn probe_cli_version(cli_path: &std::path::Path) {
    match tokio::process::Command::new(cli_path)
        .arg("--version")
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            debug!(version = %version.trim(), "agent CLI version");
        }
        Ok(output) => {
            warn!(code = ?output.status.code(), "agent CLI version probe failed");
        }
        Err(e) => {
            warn!(error = %e, "agent CLI version probe failed");
        }
    }
}

/// Ordered stream of one turn's messages
///
/// Ends after the turn's `result`; at most one `result` is yielded.
pub struct ResponseStream<'a> {
    rx: &'a mut mpsc::Receiver<Result<Message>>,
    done: bool,
}

impl ResponseStream<'_> {
    /// Next message of the turn, or `None` once the turn is over
    pub async fn next(&mut self) -> Option<Result<Message>> {
        if self.done {
            return None;
        }
        let item = self.rx.recv().await?;
        if matches!(&item, Ok(message) if message.is_result()) {
            self.done = true;
        }
        Some(item)
    }

    /// Drain the turn, returning its `result` message
    pub async fn drain(&mut self) -> Result<Option<agentwire_protocol::ResultMessage>> {
        let mut result = None;
        while let Some(item) = self.next().await {
            if let Message::Result(r) = item? {
                result = Some(r);
            }
        }
        Ok(result)
    }
}
