//! Cursor tracking across concurrent streams (core's invariant 5: a cursor
//! with no local edits, watching a stream others commit to, ends up wherever
//! sequentially applying each commit's patch would put it).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use sloked_cursor::Cursor;
use sloked_editing::Transaction;
use sloked_encoding::Utf8Encoding;
use sloked_stream::TransactionStreamMultiplexer;
use sloked_text::{PlainTextBlock, TextBlock, TextPosition};

fn document(lines: &[&str]) -> (Rc<RefCell<dyn TextBlock>>, TransactionStreamMultiplexer) {
    let block = PlainTextBlock::from_lines(lines.iter().map(|l| l.as_bytes().to_vec()).collect());
    let text: Rc<RefCell<dyn TextBlock>> = Rc::new(RefCell::new(block));
    let mux = TransactionStreamMultiplexer::new(Rc::clone(&text), Arc::new(Utf8Encoding));
    (text, mux)
}

#[test]
fn idle_cursor_tracks_sequential_commits_from_other_streams() {
    let (text, mux) = document(&["abcdefghij"]);
    let watcher = Cursor::new(Rc::clone(&text), Arc::new(Utf8Encoding), mux.new_stream());
    watcher.set_position(0, 5).unwrap();

    let writer = mux.new_stream();
    writer.commit(Transaction::insert(TextPosition::new(0, 0), b"12".to_vec())).unwrap();
    assert_eq!(watcher.position(), TextPosition::new(0, 7));

    writer.commit(Transaction::insert(TextPosition::new(0, 0), b"34".to_vec())).unwrap();
    assert_eq!(watcher.position(), TextPosition::new(0, 9));

    writer
        .commit(Transaction::clear_region(
            &*text.borrow(),
            &Utf8Encoding,
            TextPosition::new(0, 0),
            TextPosition::new(0, 2),
        ).unwrap())
        .unwrap();
    assert_eq!(watcher.position(), TextPosition::new(0, 7));
}

#[test]
fn two_cursors_on_the_same_stream_both_move_on_commit() {
    let (text, mux) = document(&["one two three"]);
    let stream = mux.new_stream();
    let a = Cursor::new(Rc::clone(&text), Arc::new(Utf8Encoding), mux.new_stream());
    let b = Cursor::new(Rc::clone(&text), Arc::new(Utf8Encoding), mux.new_stream());
    a.set_position(0, 4).unwrap();
    b.set_position(0, 8).unwrap();

    stream.commit(Transaction::insert(TextPosition::new(0, 0), b"X".to_vec())).unwrap();

    assert_eq!(a.position(), TextPosition::new(0, 5));
    assert_eq!(b.position(), TextPosition::new(0, 9));
}
