//! One-shot queries
//!
//! [`query`] spawns a transient transport, sends a single user turn, and
//! streams messages until the turn's `result`, after which the transport is
//! torn down. Concurrent queries are fully independent.

use crate::error::Result;
use crate::options::AgentOptions;
use crate::session::Session;
use agentwire_protocol::content::ContentBlock;
use agentwire_protocol::message::Message;
use agentwire_protocol::ResultMessage;

/// Consumer channel capacity for one-shot queries
const QUERY_CHANNEL_CAPACITY: usize = 100;

/// Run a one-shot prompt, streaming messages until the `result`
pub async fn query(prompt: impl Into<String>, options: AgentOptions) -> Result<QueryStream> {
    let session = Session::connect_with_capacity(options, QUERY_CHANNEL_CAPACITY).await?;
    session.send_turn(prompt).await?;
    Ok(QueryStream {
        session,
        done: false,
        closed: false,
    })
}

/// Run a one-shot turn of content blocks
pub async fn query_with_content(
    blocks: Vec<ContentBlock>,
    options: AgentOptions,
) -> Result<QueryStream> {
    let session = Session::connect_with_capacity(options, QUERY_CHANNEL_CAPACITY).await?;
    session.send_turn_content(blocks).await?;
    Ok(QueryStream {
        session,
        done: false,
        closed: false,
    })
}

/// Ordered lazy stream of a one-shot query's messages
///
/// Terminates at the first `result`; the transient transport is closed on
/// the next poll after that (or explicitly via [`QueryStream::close`]).
pub struct QueryStream {
    session: Session,
    done: bool,
    closed: bool,
}

impl QueryStream {
    /// Next message, or `None` once the turn is over
    pub async fn next(&mut self) -> Option<Result<Message>> {
        if self.done {
            self.ensure_closed().await;
            return None;
        }
        match self.session.next_message().await {
            Some(item) => {
                if matches!(&item, Ok(message) if message.is_result()) {
                    self.done = true;
                }
                Some(item)
            }
            None => {
                self.done = true;
                self.ensure_closed().await;
                None
            }
        }
    }

    /// Drain the stream and return the terminal `result` message
    pub async fn final_result(&mut self) -> Result<Option<ResultMessage>> {
        let mut result = None;
        while let Some(item) = self.next().await {
            if let Message::Result(r) = item? {
                result = Some(r);
            }
        }
        Ok(result)
    }

    /// Tear the transient transport down
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        self.session.close().await
    }

    async fn ensure_closed(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.session.close().await;
        }
    }
}
