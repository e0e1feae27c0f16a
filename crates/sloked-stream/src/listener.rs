//! Fan-out notification for transaction streams.

use sloked_editing::Transaction;

/// Notified of every commit/rollback/revert across every stream sharing a
/// multiplexer — not just the stream a listener was registered through.
/// Cursors use this to rebase their own position on edits made by anyone.
pub trait TransactionListener {
    fn on_commit(&self, transaction: &Transaction);
    fn on_rollback(&self, transaction: &Transaction);
    fn on_revert(&self, transaction: &Transaction);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) usize);
