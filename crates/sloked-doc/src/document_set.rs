//! [`DocumentSet`]: a thin in-memory map from document id to the text,
//! encoding, and newline style it was opened with, each paired with its own
//! [`TransactionStreamMultiplexer`] so callers can open streams and cursors
//! onto it directly. File I/O is left to the embedder: `open`/`save` take a
//! `Read`/`Write`, never a path, matching the platform-backend boundary.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::Arc;

use sloked_cursor::Cursor;
use sloked_encoding::{Encoding, EncodingError};
use sloked_sched::{ActionQueue, TaskResult, TaskResultSupplier};
use sloked_stream::{TransactionStream, TransactionStreamMultiplexer};
use sloked_text::{PlainTextBlock, TextBlock, TextBlockError};
use thiserror::Error;
use tracing::trace;

use crate::config::DocumentSetConfig;
use crate::newline::NewlineStyle;

/// Identifies a document within one [`DocumentSet`]. Not meaningful across
/// different `DocumentSet`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(usize);

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document {0:?} is not open")]
    NotOpen(DocumentId),
    #[error("document id {0:?} is already in use")]
    AlreadyOpen(DocumentId),
    #[error("reading document content: {0}")]
    Io(#[from] std::io::Error),
    #[error("decoding document content: {0}")]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Block(#[from] TextBlockError),
}

struct DocumentEntry {
    text: Rc<RefCell<dyn TextBlock>>,
    encoding: Arc<dyn Encoding>,
    newline: NewlineStyle,
    upstream: Option<String>,
    multiplexer: TransactionStreamMultiplexer,
}

/// A thin map of open documents. Intentionally has no knowledge of
/// filenames, RPC peers, or on-disk formats — those are external
/// collaborators per the crate's scope.
pub struct DocumentSet {
    documents: HashMap<DocumentId, DocumentEntry>,
    next_id: usize,
    default_newline: NewlineStyle,
}

impl DocumentSet {
    pub fn new(config: DocumentSetConfig) -> Self {
        Self {
            documents: HashMap::new(),
            next_id: 0,
            default_newline: config.default_newline_style,
        }
    }

    pub fn default_newline_style(&self) -> NewlineStyle {
        self.default_newline
    }

    /// Read `reader` fully, validate it under `encoding`, split it per
    /// `newline`, and register it under a freshly assigned id.
    pub fn open(
        &mut self,
        reader: &mut dyn Read,
        encoding: Arc<dyn Encoding>,
        newline: NewlineStyle,
        upstream: Option<String>,
    ) -> Result<DocumentId, DocumentError> {
        let id = DocumentId(self.next_id);
        self.next_id += 1;
        self.open_by_id(id, reader, encoding, newline, upstream)?;
        Ok(id)
    }

    /// As [`Self::open`], but under a caller-chosen id — for callers (an
    /// RPC peer, say) that assign document ids themselves.
    pub fn open_by_id(
        &mut self,
        id: DocumentId,
        reader: &mut dyn Read,
        encoding: Arc<dyn Encoding>,
        newline: NewlineStyle,
        upstream: Option<String>,
    ) -> Result<(), DocumentError> {
        if self.documents.contains_key(&id) {
            return Err(DocumentError::AlreadyOpen(id));
        }
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        let lines = newline.split(&content);
        for line in &lines {
            encoding.decode(line)?;
        }
        let text: Rc<RefCell<dyn TextBlock>> =
            Rc::new(RefCell::new(PlainTextBlock::from_lines(lines)));
        let multiplexer = TransactionStreamMultiplexer::new(Rc::clone(&text), Arc::clone(&encoding));
        self.documents
            .insert(id, DocumentEntry { text, encoding, newline, upstream, multiplexer });
        trace!(target: "sloked::doc", id = id.0, "opened document");
        Ok(())
    }

    /// Serialize the document's current text (its newline style preserved)
    /// into `writer`.
    pub fn save(&self, id: DocumentId, writer: &mut dyn Write) -> Result<(), DocumentError> {
        let entry = self.documents.get(&id).ok_or(DocumentError::NotOpen(id))?;
        let mut lines = Vec::new();
        let text = entry.text.borrow();
        text.visit(0, text.last_line_index() + 1, &mut |_, line| lines.push(line.to_vec()))?;
        writer.write_all(&entry.newline.join(&lines))?;
        trace!(target: "sloked::doc", id = id.0, "saved document");
        Ok(())
    }

    /// Save and rebind the document's upstream identifier in one step.
    pub fn save_as(
        &mut self,
        id: DocumentId,
        writer: &mut dyn Write,
        new_upstream: Option<String>,
    ) -> Result<(), DocumentError> {
        self.save(id, writer)?;
        let entry = self.documents.get_mut(&id).ok_or(DocumentError::NotOpen(id))?;
        entry.upstream = new_upstream;
        Ok(())
    }

    /// Serialize the document now, but resolve the result as one task on
    /// `queue` rather than returning it directly — lets a save interleave
    /// with whatever else the embedder's executor has scheduled.
    pub fn schedule_save(
        &self,
        id: DocumentId,
        queue: &dyn ActionQueue,
    ) -> Result<TaskResult<Vec<u8>, String>, DocumentError> {
        let mut buf = Vec::new();
        let saved = self.save(id, &mut buf).map(|()| buf);
        let supplier: TaskResultSupplier<Vec<u8>, String> = TaskResultSupplier::new();
        let task_result = supplier.result();
        queue.enqueue_boxed(Box::new(move || {
            let _ = match saved {
                Ok(buf) => supplier.set_result(buf),
                Err(err) => supplier.set_error(err.to_string()),
            };
        }));
        Ok(task_result)
    }

    pub fn close(&mut self, id: DocumentId) -> Result<(), DocumentError> {
        self.documents.remove(&id).map(|_| ()).ok_or(DocumentError::NotOpen(id))
    }

    /// The id of the document opened from `upstream`, if any is currently
    /// open with that identifier.
    pub fn get_id(&self, upstream: &str) -> Option<DocumentId> {
        self.documents
            .iter()
            .find(|(_, entry)| entry.upstream.as_deref() == Some(upstream))
            .map(|(id, _)| *id)
    }

    pub fn get_upstream(&self, id: DocumentId) -> Option<&str> {
        self.documents.get(&id).and_then(|entry| entry.upstream.as_deref())
    }

    /// Open a new writer stream onto a document's shared text.
    pub fn new_stream(&self, id: DocumentId) -> Option<TransactionStream> {
        self.documents.get(&id).map(|entry| entry.multiplexer.new_stream())
    }

    /// Open a new cursor, backed by a freshly opened stream, onto a
    /// document.
    pub fn new_cursor(&self, id: DocumentId) -> Result<Cursor, DocumentError> {
        let entry = self.documents.get(&id).ok_or(DocumentError::NotOpen(id))?;
        let stream = entry.multiplexer.new_stream();
        Ok(Cursor::new(Rc::clone(&entry.text), Arc::clone(&entry.encoding), stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sloked_encoding::Utf8Encoding;
    use std::io::Cursor as IoCursor;

    fn set() -> DocumentSet {
        DocumentSet::new(DocumentSetConfig::default())
    }

    #[test]
    fn open_then_save_round_trips_content() {
        let mut docs = set();
        let mut input = IoCursor::new(b"hello\r\nworld".to_vec());
        let id = docs
            .open(&mut input, Arc::new(Utf8Encoding), NewlineStyle::Crlf, Some("a.txt".to_string()))
            .unwrap();

        let mut output = Vec::new();
        docs.save(id, &mut output).unwrap();
        assert_eq!(output, b"hello\r\nworld");
        assert_eq!(docs.get_upstream(id), Some("a.txt"));
        assert_eq!(docs.get_id("a.txt"), Some(id));
    }

    #[test]
    fn open_by_id_rejects_a_reused_id() {
        let mut docs = set();
        let id = docs
            .open(&mut IoCursor::new(b"x".to_vec()), Arc::new(Utf8Encoding), NewlineStyle::Lf, None)
            .unwrap();
        let err = docs
            .open_by_id(id, &mut IoCursor::new(b"y".to_vec()), Arc::new(Utf8Encoding), NewlineStyle::Lf, None)
            .unwrap_err();
        assert!(matches!(err, DocumentError::AlreadyOpen(_)));
    }

    #[test]
    fn closing_an_unopened_document_fails() {
        let mut docs = set();
        let bogus = docs
            .open(&mut IoCursor::new(Vec::new()), Arc::new(Utf8Encoding), NewlineStyle::Lf, None)
            .unwrap();
        docs.close(bogus).unwrap();
        assert!(matches!(docs.close(bogus), Err(DocumentError::NotOpen(_))));
    }

    #[test]
    fn a_cursor_opened_on_the_document_sees_its_own_edits() {
        let mut docs = set();
        let id = docs
            .open(&mut IoCursor::new(b"ab".to_vec()), Arc::new(Utf8Encoding), NewlineStyle::Lf, None)
            .unwrap();
        let cursor = docs.new_cursor(id).unwrap();
        let pos = cursor.insert(b"X".to_vec()).unwrap();
        assert_eq!(pos, sloked_text::TextPosition::new(0, 1));

        let mut output = Vec::new();
        docs.save(id, &mut output).unwrap();
        assert_eq!(output, b"Xab");
    }

    #[test]
    fn opening_from_a_real_file_works_through_the_read_boundary() {
        use std::io::{Seek, SeekFrom, Write as _};

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"line one\nline two").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut docs = set();
        let id = docs.open(file.as_file_mut(), Arc::new(Utf8Encoding), NewlineStyle::Lf, None).unwrap();
        let mut output = Vec::new();
        docs.save(id, &mut output).unwrap();
        assert_eq!(output, b"line one\nline two");
    }

    #[test]
    fn schedule_save_resolves_once_the_queue_is_drained() {
        let mut docs = set();
        let id = docs
            .open(&mut IoCursor::new(b"abc".to_vec()), Arc::new(Utf8Encoding), NewlineStyle::Lf, None)
            .unwrap();
        let queue = sloked_sched::SingleThreadActionQueue::new();
        let task = docs.schedule_save(id, &queue).unwrap();
        assert_eq!(task.status(), sloked_sched::TaskStatus::Pending);
        queue.run_until_empty();
        assert_eq!(task.status(), sloked_sched::TaskStatus::Ready);
        assert_eq!(task.unwrap().unwrap(), b"abc".to_vec());
    }
}
