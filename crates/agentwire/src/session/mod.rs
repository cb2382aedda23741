//! Stateful sessions with the Agent CLI
//!
//! [`Session`] is the single-owner front end: one logical sender, one
//! logical receiver. [`SharedSession`] is the serialized variant for
//! callers that must share a session across workers; it holds an exclusive
//! lock across each send-and-drain span so turns cannot interleave.

mod control;
mod core;
mod shared;

pub use core::{ResponseStream, Session};
pub use shared::SharedSession;
