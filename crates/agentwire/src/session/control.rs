//! Runtime control: interrupt, permission mode, file rewind

use crate::error::Result;
use crate::session::core::Session;
use agentwire_protocol::control::ControlRequestBody;
use agentwire_protocol::permissions::PermissionMode;
use std::time::Duration;

/// Deadline for interrupt and rewind acknowledgements
const CONTROL_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for permission mode changes
const MODE_TIMEOUT: Duration = Duration::from_secs(30);

impl Session {
    /// Interrupt the in-flight turn
    ///
    /// Resolves when the Agent acknowledges; the interrupted turn still
    /// emits its `result`.
    pub async fn interrupt(&self) -> Result<()> {
        self.router
            .send_control(ControlRequestBody::Interrupt {}, Some(CONTROL_TIMEOUT))
            .await?;
        Ok(())
    }

    /// Switch the global permission mode
    ///
    /// The new mode is also noted locally so the default `can_use_tool`
    /// arbitration tracks it.
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.router
            .send_control(
                ControlRequestBody::SetPermissionMode { mode },
                Some(MODE_TIMEOUT),
            )
            .await?;
        self.router.callbacks().set_mode(mode).await;
        Ok(())
    }

    /// Revert file state to a prior user-message checkpoint
    ///
    /// `checkpoint_id` is the `uuid` of a previous user message. Requires
    /// the session to have been started with file checkpointing enabled.
    pub async fn rewind_files(&self, checkpoint_id: impl Into<String>) -> Result<()> {
        self.router
            .send_control(
                ControlRequestBody::RewindFiles {
                    checkpoint_id: checkpoint_id.into(),
                },
                Some(CONTROL_TIMEOUT),
            )
            .await?;
        Ok(())
    }
}
