//! [`TransactionStreamMultiplexer`]: the single shared owner of the
//! document's [`TextBlock`], arbitrating commits from any number of
//! [`TransactionStream`] handles and letting each one roll back and replay
//! past whatever the others have done since.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use sloked_editing::Transaction;
use sloked_encoding::Encoding;
use sloked_text::{PatchMap, TextBlock, TextPosition};
use tracing::trace;

use crate::error::StreamError;
use crate::listener::{ListenerId, TransactionListener};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(usize);

#[derive(Debug, Clone)]
struct LabeledTransaction {
    stream: StreamId,
    stamp: u64,
    transaction: Transaction,
}

struct Inner {
    text: Rc<RefCell<dyn TextBlock>>,
    encoding: Arc<dyn Encoding>,
    journal: Vec<LabeledTransaction>,
    backtrack: HashMap<StreamId, Vec<LabeledTransaction>>,
    listeners: Vec<(ListenerId, Rc<dyn TransactionListener>)>,
    next_stream_id: usize,
    next_listener_id: usize,
    next_stamp: u64,
    corrupted: bool,
}

impl Inner {
    fn check_corrupted(&self) -> Result<(), StreamError> {
        if self.corrupted {
            Err(StreamError::CoreCorruption)
        } else {
            Ok(())
        }
    }

    fn mark_corrupted_on_err<T>(&mut self, result: Result<T, StreamError>) -> Result<T, StreamError> {
        if let Err(ref err) = result {
            self.corrupted = true;
            tracing::error!(target: "sloked::stream", error = %err, "multiplexer core corrupted");
        }
        result
    }

    fn notify(&self, event: Event<'_>) {
        // Snapshot the listener list before dispatching: a listener that
        // unregisters itself (or another listener) from inside its own
        // callback must not perturb this iteration.
        let snapshot: Vec<_> = self.listeners.iter().map(|(_, l)| Rc::clone(l)).collect();
        for listener in snapshot {
            match event {
                Event::Commit(t) => listener.on_commit(t),
                Event::Rollback(t) => listener.on_rollback(t),
                Event::Revert(t) => listener.on_revert(t),
            }
        }
    }

    fn commit(&mut self, stream: StreamId, transaction: Transaction) -> Result<TextPosition, StreamError> {
        self.check_corrupted()?;
        // An ordinary commit failure (a bad anchor, say) is the caller's
        // mistake, not a broken invariant — it must not poison the whole
        // multiplexer the way a failed rebase would.
        let (pos, _patch) = transaction.commit(&mut *self.text.borrow_mut(), &*self.encoding)?;
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.journal.push(LabeledTransaction { stream, stamp, transaction: transaction.clone() });
        if let Some(stack) = self.backtrack.get_mut(&stream) {
            stack.clear();
        }
        trace!(target: "sloked::stream", ?stream, stamp, "committed");
        self.notify(Event::Commit(&transaction));
        Ok(pos)
    }

    fn has_rollback(&self, stream: StreamId) -> bool {
        self.journal.iter().rev().any(|e| e.stream == stream)
    }

    fn rollback(&mut self, stream: StreamId) -> Result<TextPosition, StreamError> {
        self.check_corrupted()?;
        let Some(found) = self.journal.iter().rposition(|e| e.stream == stream) else {
            return Ok(TextPosition::origin());
        };

        let result = (|| -> Result<(TextPosition, PatchMap), StreamError> {
            let mut pos = TextPosition::origin();
            let mut rollback_patch = PatchMap::identity();
            for i in (found..self.journal.len()).rev() {
                let (p, patch) =
                    self.journal[i].transaction.rollback(&mut *self.text.borrow_mut(), &*self.encoding)?;
                if i == found {
                    pos = p;
                    rollback_patch = patch;
                }
            }
            Ok((pos, rollback_patch))
        })();
        let (mut pos, rollback_patch) = self.mark_corrupted_on_err(result)?;

        let removed = self.journal.remove(found);
        self.backtrack.entry(stream).or_default().push(removed.clone());

        let result: Result<(), StreamError> = (|| {
            for i in found..self.journal.len() {
                let text_ref = self.text.borrow();
                let rebased = self.journal[i].transaction.update(&rollback_patch, &*text_ref, &*self.encoding)?;
                drop(text_ref);
                self.journal[i].transaction = rebased;
                let (_, commit_patch) =
                    self.journal[i].transaction.commit(&mut *self.text.borrow_mut(), &*self.encoding)?;
                pos = commit_patch.apply(pos);
            }
            Ok(())
        })();
        self.mark_corrupted_on_err(result)?;

        trace!(target: "sloked::stream", ?stream, "rolled back");
        self.notify(Event::Rollback(&removed.transaction));
        Ok(pos)
    }

    fn has_revertable(&self, stream: StreamId) -> bool {
        self.backtrack.get(&stream).is_some_and(|s| !s.is_empty())
    }

    fn revert_rollback(&mut self, stream: StreamId) -> Result<TextPosition, StreamError> {
        self.check_corrupted()?;
        let Some(entry) = self.backtrack.get_mut(&stream).and_then(|s| s.pop()) else {
            return Ok(TextPosition::origin());
        };

        let idx = self
            .journal
            .iter()
            .position(|e| e.stamp >= entry.stamp)
            .unwrap_or(self.journal.len());

        let result: Result<(TextPosition, PatchMap), StreamError> = (|| {
            for i in (idx..self.journal.len()).rev() {
                self.journal[i].transaction.rollback(&mut *self.text.borrow_mut(), &*self.encoding)?;
            }
            let (pos, patch) = entry.transaction.commit(&mut *self.text.borrow_mut(), &*self.encoding)?;
            Ok((pos, patch))
        })();
        let (mut pos, patch) = self.mark_corrupted_on_err(result)?;

        self.journal.insert(idx, entry.clone());

        let result: Result<(), StreamError> = (|| {
            for i in (idx + 1)..self.journal.len() {
                let text_ref = self.text.borrow();
                let rebased = self.journal[i].transaction.update(&patch, &*text_ref, &*self.encoding)?;
                drop(text_ref);
                self.journal[i].transaction = rebased;
                let (_, commit_patch) =
                    self.journal[i].transaction.commit(&mut *self.text.borrow_mut(), &*self.encoding)?;
                pos = commit_patch.apply(pos);
            }
            Ok(())
        })();
        self.mark_corrupted_on_err(result)?;

        trace!(target: "sloked::stream", ?stream, "reverted rollback");
        self.notify(Event::Revert(&entry.transaction));
        Ok(pos)
    }
}

enum Event<'a> {
    Commit(&'a Transaction),
    Rollback(&'a Transaction),
    Revert(&'a Transaction),
}

/// Owns the shared [`TextBlock`] and arbitrates every [`TransactionStream`]
/// writing to it.
#[derive(Clone)]
pub struct TransactionStreamMultiplexer {
    inner: Rc<RefCell<Inner>>,
}

impl TransactionStreamMultiplexer {
    pub fn new(text: Rc<RefCell<dyn TextBlock>>, encoding: Arc<dyn Encoding>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                text,
                encoding,
                journal: Vec::new(),
                backtrack: HashMap::new(),
                listeners: Vec::new(),
                next_stream_id: 0,
                next_listener_id: 0,
                next_stamp: 0,
                corrupted: false,
            })),
        }
    }

    /// Open a new writer handle onto this document.
    pub fn new_stream(&self) -> TransactionStream {
        let mut inner = self.inner.borrow_mut();
        let id = StreamId(inner.next_stream_id);
        inner.next_stream_id += 1;
        inner.backtrack.insert(id, Vec::new());
        drop(inner);
        TransactionStream { multiplexer: self.clone(), stream_id: id }
    }

    /// Register a listener notified of every commit/rollback/revert, from
    /// any stream.
    pub fn add_listener(&self, listener: Rc<dyn TransactionListener>) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_listener_id);
        inner.next_listener_id += 1;
        inner.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.borrow_mut().listeners.retain(|(existing, _)| *existing != id);
    }

    pub fn is_corrupted(&self) -> bool {
        self.inner.borrow().corrupted
    }
}

/// A per-writer handle onto a [`TransactionStreamMultiplexer`]'s shared
/// document. Dropping it frees the stream's rollback bookkeeping.
pub struct TransactionStream {
    multiplexer: TransactionStreamMultiplexer,
    stream_id: StreamId,
}

impl TransactionStream {
    pub fn id(&self) -> StreamId {
        self.stream_id
    }

    pub fn commit(&self, transaction: Transaction) -> Result<TextPosition, StreamError> {
        self.multiplexer.inner.borrow_mut().commit(self.stream_id, transaction)
    }

    pub fn has_rollback(&self) -> bool {
        self.multiplexer.inner.borrow().has_rollback(self.stream_id)
    }

    pub fn rollback(&self) -> Result<TextPosition, StreamError> {
        self.multiplexer.inner.borrow_mut().rollback(self.stream_id)
    }

    pub fn has_revertable(&self) -> bool {
        self.multiplexer.inner.borrow().has_revertable(self.stream_id)
    }

    pub fn revert_rollback(&self) -> Result<TextPosition, StreamError> {
        self.multiplexer.inner.borrow_mut().revert_rollback(self.stream_id)
    }

    /// Register a listener on the multiplexer this stream belongs to. The
    /// listener sees every stream's events, not just this one's.
    pub fn add_listener(&self, listener: Rc<dyn TransactionListener>) -> ListenerId {
        self.multiplexer.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.multiplexer.remove_listener(id)
    }
}

impl Drop for TransactionStream {
    fn drop(&mut self) {
        let mut inner = self.multiplexer.inner.borrow_mut();
        inner.backtrack.remove(&self.stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sloked_encoding::Utf8Encoding;
    use sloked_text::PlainTextBlock;

    fn new_multiplexer(lines: &[&str]) -> (TransactionStreamMultiplexer, Rc<RefCell<dyn TextBlock>>) {
        let block = PlainTextBlock::from_lines(lines.iter().map(|l| l.as_bytes().to_vec()).collect());
        let text: Rc<RefCell<dyn TextBlock>> = Rc::new(RefCell::new(block));
        let mux = TransactionStreamMultiplexer::new(Rc::clone(&text), Arc::new(Utf8Encoding));
        (mux, text)
    }

    fn dump(text: &Rc<RefCell<dyn TextBlock>>) -> Vec<String> {
        let text = text.borrow();
        let mut out = vec![];
        text.visit(0, text.last_line_index() + 1, &mut |_, line| {
            out.push(String::from_utf8_lossy(line).into_owned())
        })
        .unwrap();
        out
    }

    #[test]
    fn single_stream_commit_rollback_revert() {
        let (mux, text) = new_multiplexer(&["hello"]);
        let stream = mux.new_stream();
        let tx = Transaction::insert(TextPosition::new(0, 5), b" world".to_vec());
        stream.commit(tx).unwrap();
        assert_eq!(dump(&text), vec!["hello world"]);

        assert!(stream.has_rollback());
        stream.rollback().unwrap();
        assert_eq!(dump(&text), vec!["hello"]);

        assert!(stream.has_revertable());
        stream.revert_rollback().unwrap();
        assert_eq!(dump(&text), vec!["hello world"]);
    }

    #[test]
    fn interleaved_streams_rebase_on_rollback() {
        // Stream A inserts "A" at column 0; stream B then inserts "B" right
        // after it. Rolling back A must rebase B's already-committed edit
        // back onto the original column.
        let (mux, text) = new_multiplexer(&["xyz"]);
        let stream_a = mux.new_stream();
        let stream_b = mux.new_stream();

        stream_a.commit(Transaction::insert(TextPosition::new(0, 0), b"A".to_vec())).unwrap();
        assert_eq!(dump(&text), vec!["Axyz"]);

        stream_b.commit(Transaction::insert(TextPosition::new(0, 1), b"B".to_vec())).unwrap();
        assert_eq!(dump(&text), vec!["ABxyz"]);

        stream_a.rollback().unwrap();
        assert_eq!(dump(&text), vec!["Bxyz"]);
    }

    #[test]
    fn a_bad_anchor_commit_fails_without_corrupting_the_multiplexer() {
        let (mux, text) = new_multiplexer(&["hello"]);
        let stream = mux.new_stream();

        let bad = Transaction::insert(TextPosition::new(5, 0), b"x".to_vec());
        let err = stream.commit(bad).unwrap_err();
        assert!(matches!(err, StreamError::Editing(_)));
        assert!(!mux.is_corrupted());

        stream.commit(Transaction::insert(TextPosition::new(0, 0), b"!".to_vec())).unwrap();
        assert_eq!(dump(&text), vec!["!hello"]);
    }

    #[test]
    fn listener_removal_mid_dispatch_does_not_panic() {
        struct SelfRemoving {
            mux: TransactionStreamMultiplexer,
            id: RefCell<Option<ListenerId>>,
        }
        impl TransactionListener for SelfRemoving {
            fn on_commit(&self, _transaction: &Transaction) {
                if let Some(id) = self.id.borrow_mut().take() {
                    self.mux.remove_listener(id);
                }
            }
            fn on_rollback(&self, _transaction: &Transaction) {}
            fn on_revert(&self, _transaction: &Transaction) {}
        }

        let (mux, _text) = new_multiplexer(&["a"]);
        let listener = Rc::new(SelfRemoving { mux: mux.clone(), id: RefCell::new(None) });
        let id = mux.add_listener(listener.clone());
        *listener.id.borrow_mut() = Some(id);

        let stream = mux.new_stream();
        stream.commit(Transaction::insert(TextPosition::new(0, 0), b"x".to_vec())).unwrap();
        stream.commit(Transaction::insert(TextPosition::new(0, 0), b"y".to_vec())).unwrap();
    }
}
