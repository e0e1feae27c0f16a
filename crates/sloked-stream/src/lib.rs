//! Multiplexes several writers (streams) onto one shared [`sloked_text::TextBlock`],
//! giving each an independent commit/rollback/revert history while keeping
//! every other stream's pending edits correctly rebased.

mod error;
mod listener;
mod multiplexer;

pub use error::StreamError;
pub use listener::{ListenerId, TransactionListener};
pub use multiplexer::{StreamId, TransactionStream, TransactionStreamMultiplexer};
