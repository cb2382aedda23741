//! Serialized shared session
//!
//! Turns on a single session are sequential by nature. Rather than lock
//! individual methods (which would admit interleaved response streams from
//! concurrent senders), [`SharedSession`] holds one lock across the entire
//! send-and-drain span and hands each caller a fresh per-turn channel.

use crate::error::Result;
use crate::routing::ProtocolRouter;
use crate::session::core::Session;
use agentwire_protocol::content::ContentBlock;
use agentwire_protocol::control::ControlRequestBody;
use agentwire_protocol::message::Message;
use agentwire_protocol::permissions::PermissionMode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Per-turn channel capacity
const TURN_CHANNEL_CAPACITY: usize = 10;

/// A session shareable across workers, one fully-serialized turn at a time
///
/// For any two turns A and B where A starts first, A's `result` is
/// delivered before any of B's messages.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
    /// Direct router handle so control requests bypass the turn lock.
    router: Arc<ProtocolRouter>,
}

enum TurnInput {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl SharedSession {
    /// Wrap a connected session
    pub fn new(session: Session) -> Self {
        let router = Arc::clone(&session.router);
        Self {
            inner: Arc::new(Mutex::new(session)),
            router,
        }
    }

    /// Run one turn: send the prompt, stream its messages
    ///
    /// The session lock is held until the turn's `result` has been
    /// forwarded (or the turn stream ends); the next caller blocks until
    /// then.
    pub async fn run_turn(
        &self,
        prompt: impl Into<String>,
    ) -> Result<mpsc::Receiver<Result<Message>>> {
        self.run(TurnInput::Text(prompt.into())).await
    }

    /// Run one turn with content blocks
    pub async fn run_turn_content(
        &self,
        blocks: Vec<ContentBlock>,
    ) -> Result<mpsc::Receiver<Result<Message>>> {
        self.run(TurnInput::Blocks(blocks)).await
    }

    async fn run(&self, input: TurnInput) -> Result<mpsc::Receiver<Result<Message>>> {
        let mut guard = Arc::clone(&self.inner).lock_owned().await;

        match input {
            TurnInput::Text(prompt) => guard.send_turn(prompt).await?,
            TurnInput::Blocks(blocks) => guard.send_turn_content(blocks).await?,
        }

        let (tx, rx) = mpsc::channel(TURN_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            // The guard moves in here: the lock spans send through drain.
            let mut stream = guard.receive_response();
            while let Some(item) = stream.next().await {
                let turn_over = matches!(&item, Ok(message) if message.is_result());
                if tx.send(item).await.is_err() {
                    // Receiver detached: keep draining so the next turn
                    // starts from a clean channel.
                    while let Some(item) = stream.next().await {
                        if matches!(&item, Ok(message) if message.is_result()) {
                            break;
                        }
                    }
                    break;
                }
                if turn_over {
                    break;
                }
            }
        });

        Ok(rx)
    }

    /// Interrupt the in-flight turn
    ///
    /// Deliberately bypasses the turn lock: interrupting a running turn is
    /// the point. Control requests ride the writer lock instead.
    pub async fn interrupt(&self) -> Result<()> {
        self.router
            .send_control(ControlRequestBody::Interrupt {}, Some(Duration::from_secs(60)))
            .await?;
        Ok(())
    }

    /// Switch the global permission mode
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.router
            .send_control(
                ControlRequestBody::SetPermissionMode { mode },
                Some(Duration::from_secs(30)),
            )
            .await?;
        self.router.callbacks().set_mode(mode).await;
        Ok(())
    }

    /// Close the underlying session
    ///
    /// Also bypasses the turn lock: closing cancels any in-flight turn,
    /// whose per-turn channel then ends.
    pub async fn close(&self) -> Result<()> {
        self.router.shutdown().await
    }
}
