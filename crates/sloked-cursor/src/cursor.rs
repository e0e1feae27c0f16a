//! [`Cursor`]: a stateful position that emits edits through a
//! [`TransactionStream`] and tracks where it ends up by watching every
//! commit/rollback/revert on that stream's multiplexer, including its own.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use sloked_editing::{EditingError, Transaction};
use sloked_encoding::Encoding;
use sloked_stream::{ListenerId, StreamError, TransactionListener, TransactionStream};
use sloked_text::{TextBlock, TextBlockError, TextPosition};
use thiserror::Error;

/// Failures surfaced from a [`Cursor`] operation.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Editing(#[from] EditingError),
    #[error(transparent)]
    Block(#[from] TextBlockError),
}

struct CursorState {
    position: TextPosition,
}

/// Registered with the stream's multiplexer; rebases the cursor's position
/// on every commit/rollback/revert, from any stream, including the one this
/// cursor itself writes through.
struct PatchListener {
    state: Rc<RefCell<CursorState>>,
    encoding: Arc<dyn Encoding>,
}

impl TransactionListener for PatchListener {
    fn on_commit(&self, transaction: &Transaction) {
        let patch = transaction.commit_patch(&*self.encoding);
        let mut state = self.state.borrow_mut();
        state.position = patch.apply(state.position);
    }

    fn on_rollback(&self, transaction: &Transaction) {
        let patch = transaction.rollback_patch(&*self.encoding);
        let mut state = self.state.borrow_mut();
        state.position = patch.apply(state.position);
    }

    fn on_revert(&self, transaction: &Transaction) {
        // Reverting a rollback recommits the original transaction.
        let patch = transaction.commit_patch(&*self.encoding);
        let mut state = self.state.borrow_mut();
        state.position = patch.apply(state.position);
    }
}

/// A single editing position backed by a [`TransactionStream`].
pub struct Cursor {
    state: Rc<RefCell<CursorState>>,
    text: Rc<RefCell<dyn TextBlock>>,
    encoding: Arc<dyn Encoding>,
    stream: TransactionStream,
    listener_id: ListenerId,
}

impl Cursor {
    pub fn new(
        text: Rc<RefCell<dyn TextBlock>>,
        encoding: Arc<dyn Encoding>,
        stream: TransactionStream,
    ) -> Self {
        let state = Rc::new(RefCell::new(CursorState { position: TextPosition::origin() }));
        let listener: Rc<dyn TransactionListener> =
            Rc::new(PatchListener { state: Rc::clone(&state), encoding: Arc::clone(&encoding) });
        let listener_id = stream.add_listener(listener);
        Self { state, text, encoding, stream, listener_id }
    }

    pub fn position(&self) -> TextPosition {
        self.state.borrow().position
    }

    fn line_width(&self, line: usize) -> Result<usize, CursorError> {
        let bytes = self.text.borrow().line(line)?;
        Ok(self.encoding.codepoint_count(&bytes))
    }

    /// Move to `(line, column)`, clamping the column to the target line's
    /// length. A `line` past the end of the document is a no-op.
    pub fn set_position(&self, line: usize, column: usize) -> Result<TextPosition, CursorError> {
        if line > self.text.borrow().last_line_index() {
            return Ok(self.position());
        }
        let width = self.line_width(line)?;
        let mut state = self.state.borrow_mut();
        state.position = TextPosition::new(line, column.min(width));
        Ok(state.position)
    }

    pub fn move_up(&self, n: usize) -> Result<TextPosition, CursorError> {
        let current = self.position();
        let line = current.line.saturating_sub(n);
        let width = self.line_width(line)?;
        let mut state = self.state.borrow_mut();
        state.position = TextPosition::new(line, current.column.min(width));
        Ok(state.position)
    }

    pub fn move_down(&self, n: usize) -> Result<TextPosition, CursorError> {
        let current = self.position();
        let last = self.text.borrow().last_line_index();
        let line = (current.line + n).min(last);
        let width = self.line_width(line)?;
        let mut state = self.state.borrow_mut();
        state.position = TextPosition::new(line, current.column.min(width));
        Ok(state.position)
    }

    pub fn move_forward(&self, n: usize) -> Result<TextPosition, CursorError> {
        let current = self.position();
        let width = self.line_width(current.line)?;
        let mut state = self.state.borrow_mut();
        state.position = TextPosition::new(current.line, (current.column + n).min(width));
        Ok(state.position)
    }

    pub fn move_backward(&self, n: usize) -> Result<TextPosition, CursorError> {
        let current = self.position();
        let mut state = self.state.borrow_mut();
        state.position = TextPosition::new(current.line, current.column.saturating_sub(n));
        Ok(state.position)
    }

    pub fn insert(&self, content: Vec<u8>) -> Result<TextPosition, CursorError> {
        let tx = Transaction::insert(self.position(), content);
        self.stream.commit(tx)?;
        Ok(self.position())
    }

    pub fn new_line(&self, content: Vec<u8>) -> Result<TextPosition, CursorError> {
        let tx = Transaction::newline(self.position(), content);
        self.stream.commit(tx)?;
        Ok(self.position())
    }

    pub fn delete_backward(&self) -> Result<TextPosition, CursorError> {
        let tx = {
            let text = self.text.borrow();
            Transaction::delete_backward(&*text, &*self.encoding, self.position())?
        };
        self.stream.commit(tx)?;
        Ok(self.position())
    }

    pub fn delete_forward(&self) -> Result<TextPosition, CursorError> {
        let tx = {
            let text = self.text.borrow();
            Transaction::delete_forward(&*text, &*self.encoding, self.position())?
        };
        self.stream.commit(tx)?;
        Ok(self.position())
    }

    pub fn clear_region(&self, from: TextPosition, to: TextPosition) -> Result<TextPosition, CursorError> {
        let tx = {
            let text = self.text.borrow();
            Transaction::clear_region(&*text, &*self.encoding, from, to)?
        };
        self.stream.commit(tx)?;
        Ok(self.position())
    }

    pub fn undo(&self) -> Result<TextPosition, CursorError> {
        self.stream.rollback()?;
        Ok(self.position())
    }

    pub fn redo(&self) -> Result<TextPosition, CursorError> {
        self.stream.revert_rollback()?;
        Ok(self.position())
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.stream.remove_listener(self.listener_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sloked_encoding::Utf8Encoding;
    use sloked_stream::TransactionStreamMultiplexer;
    use sloked_text::PlainTextBlock;

    fn new_document(lines: &[&str]) -> (Rc<RefCell<dyn TextBlock>>, TransactionStreamMultiplexer) {
        let block = PlainTextBlock::from_lines(lines.iter().map(|l| l.as_bytes().to_vec()).collect());
        let text: Rc<RefCell<dyn TextBlock>> = Rc::new(RefCell::new(block));
        let mux = TransactionStreamMultiplexer::new(Rc::clone(&text), Arc::new(Utf8Encoding));
        (text, mux)
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
    fn insert_moves_cursor_past_inserted_text() {
        let (text, mux) = new_document(&["hello"]);
        let cursor = Cursor::new(Rc::clone(&text), Arc::new(Utf8Encoding), mux.new_stream());
        cursor.set_position(0, 5).unwrap();
        let pos = cursor.insert(b" world".to_vec()).unwrap();
        assert_eq!(pos, TextPosition::new(0, 11));
        assert_eq!(dump(&text), vec!["hello world"]);
    }

    #[test]
    fn set_position_clamps_to_line_width() {
        let (text, mux) = new_document(&["hi"]);
        let cursor = Cursor::new(Rc::clone(&text), Arc::new(Utf8Encoding), mux.new_stream());
        let pos = cursor.set_position(0, 99).unwrap();
        assert_eq!(pos, TextPosition::new(0, 2));
    }

    #[test]
    fn set_position_past_last_line_is_noop() {
        let (text, mux) = new_document(&["hi"]);
        let cursor = Cursor::new(Rc::clone(&text), Arc::new(Utf8Encoding), mux.new_stream());
        cursor.set_position(0, 1).unwrap();
        let pos = cursor.set_position(5, 0).unwrap();
        assert_eq!(pos, TextPosition::new(0, 1));
    }

    #[test]
    fn undo_restores_text_and_cursor_position() {
        let (text, mux) = new_document(&["hello"]);
        let cursor = Cursor::new(Rc::clone(&text), Arc::new(Utf8Encoding), mux.new_stream());
        cursor.set_position(0, 5).unwrap();
        cursor.insert(b"!".to_vec()).unwrap();
        assert_eq!(dump(&text), vec!["hello!"]);
        let pos = cursor.undo().unwrap();
        assert_eq!(pos, TextPosition::new(0, 5));
        assert_eq!(dump(&text), vec!["hello"]);
        let pos = cursor.redo().unwrap();
        assert_eq!(pos, TextPosition::new(0, 6));
        assert_eq!(dump(&text), vec!["hello!"]);
    }

    #[test]
    fn watching_cursor_tracks_commits_from_another_stream() {
        // A cursor that never edits anything still moves when someone else's
        // stream inserts text ahead of it.
        let (text, mux) = new_document(&["xyz"]);
        let watcher = Cursor::new(Rc::clone(&text), Arc::new(Utf8Encoding), mux.new_stream());
        watcher.set_position(0, 2).unwrap();

        let writer_stream = mux.new_stream();
        writer_stream.commit(Transaction::insert(TextPosition::new(0, 0), b"AB".to_vec())).unwrap();

        assert_eq!(watcher.position(), TextPosition::new(0, 4));
    }

    #[test]
    fn delete_backward_merges_lines_and_moves_cursor() {
        let (text, mux) = new_document(&["abc", "def"]);
        let cursor = Cursor::new(Rc::clone(&text), Arc::new(Utf8Encoding), mux.new_stream());
        cursor.set_position(1, 0).unwrap();
        let pos = cursor.delete_backward().unwrap();
        assert_eq!(pos, TextPosition::new(0, 3));
        assert_eq!(dump(&text), vec!["abcdef"]);
    }
}
