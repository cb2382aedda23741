//! Subprocess transport for the agentwire SDK
//!
//! Spawns and supervises the Agent CLI, framing both directions as
//! newline-delimited JSON. Three long-lived tasks per transport:
//!
//! 1. **stdout reader** — frames lines through the bounded codec, decodes
//!    JSON, and posts values to a bounded channel (backpressure propagates
//!    into the reader rather than dropping).
//! 2. **stderr reader** — feeds an optional observer and latches
//!    session-not-found errors surfaced by the CLI.
//! 3. **writer** — callers serialize on a writer lock; each line is flushed
//!    before the write returns.
//!
//! Typed message parsing lives a layer up, in the `agentwire` crate; this
//! crate deals in raw `serde_json::Value`s.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod discovery;
pub mod error;
pub mod process;

pub use codec::{LineReader, LineWriter, DEFAULT_MAX_LINE_LEN};
pub use discovery::{expand_tilde, find_cli, skip_version_check};
pub use error::{Result, TransportError};
pub use process::{ProcessConfig, StderrObserver, SubprocessTransport};
