//! The [`TextBlock`] contract and its two backings.

use std::borrow::Cow;

use thiserror::Error;

/// A line-indexed mutable container of raw (encoding-dependent) byte lines.
/// Lines never embed a newline; the newline style used to serialize them is
/// a concern of the document layer, not of the block itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextBlockError {
    #[error("line index {index} out of range (last line is {last_line})")]
    OutOfRange { index: usize, last_line: usize },
}

/// Line-indexed mutable text storage, generic over the backing data
/// structure (gap buffer, rope, piece table, ...). All indices are line
/// indices, zero-based.
pub trait TextBlock {
    /// Index of the last line. A block always has at least one line, so this
    /// is never out of range for `line`.
    fn last_line_index(&self) -> usize;

    /// Raw bytes of line `index`. Backings that store lines contiguously
    /// return a borrow; backings that must materialize a line (e.g. a rope)
    /// return an owned copy.
    fn line(&self, index: usize) -> Result<Cow<'_, [u8]>, TextBlockError>;

    /// Overwrite line `index` with `content`.
    fn set_line(&mut self, index: usize, content: Vec<u8>) -> Result<(), TextBlockError>;

    /// Insert a new line at `index`, pushing the former line `index` (and
    /// everything after) down by one.
    fn insert_line(&mut self, index: usize, content: Vec<u8>) -> Result<(), TextBlockError>;

    /// Remove line `index`.
    fn erase_line(&mut self, index: usize) -> Result<(), TextBlockError>;

    /// Invoke `visitor` with every line in `[from, to)`, in order.
    fn visit(
        &self,
        from: usize,
        to: usize,
        visitor: &mut dyn FnMut(usize, &[u8]),
    ) -> Result<(), TextBlockError>;

    /// Whether the block holds exactly one, empty, line.
    fn empty(&self) -> bool;

    /// Hint that the backing storage may compact itself. A no-op is a valid
    /// implementation; this exists for backings (ropes, piece tables) where
    /// a long edit session fragments internal storage.
    fn optimize(&mut self);
}

/// The simplest possible [`TextBlock`]: one `Vec<u8>` per line. Good enough
/// for small-to-medium documents and as the default when no backing is
/// specified.
#[derive(Debug, Default, Clone)]
pub struct PlainTextBlock {
    lines: Vec<Vec<u8>>,
}

impl PlainTextBlock {
    pub fn new() -> Self {
        Self { lines: vec![Vec::new()] }
    }

    pub fn from_lines(lines: Vec<Vec<u8>>) -> Self {
        if lines.is_empty() {
            Self::new()
        } else {
            Self { lines }
        }
    }

    fn check_index(&self, index: usize) -> Result<(), TextBlockError> {
        if index > self.last_line_index() {
            Err(TextBlockError::OutOfRange { index, last_line: self.last_line_index() })
        } else {
            Ok(())
        }
    }
}

impl TextBlock for PlainTextBlock {
    fn last_line_index(&self) -> usize {
        self.lines.len() - 1
    }

    fn line(&self, index: usize) -> Result<Cow<'_, [u8]>, TextBlockError> {
        self.check_index(index)?;
        Ok(Cow::Borrowed(&self.lines[index]))
    }

    fn set_line(&mut self, index: usize, content: Vec<u8>) -> Result<(), TextBlockError> {
        self.check_index(index)?;
        self.lines[index] = content;
        Ok(())
    }

    fn insert_line(&mut self, index: usize, content: Vec<u8>) -> Result<(), TextBlockError> {
        // Insertion at `last_line_index() + 1` (append) is allowed, unlike
        // the other operations, so check against len, not last_line_index.
        if index > self.lines.len() {
            return Err(TextBlockError::OutOfRange { index, last_line: self.last_line_index() });
        }
        self.lines.insert(index, content);
        Ok(())
    }

    fn erase_line(&mut self, index: usize) -> Result<(), TextBlockError> {
        self.check_index(index)?;
        if self.lines.len() == 1 {
            // Never go below one line; erasing the sole line just clears it.
            self.lines[0].clear();
        } else {
            self.lines.remove(index);
        }
        Ok(())
    }

    fn visit(
        &self,
        from: usize,
        to: usize,
        visitor: &mut dyn FnMut(usize, &[u8]),
    ) -> Result<(), TextBlockError> {
        if from > self.lines.len() {
            return Err(TextBlockError::OutOfRange { index: from, last_line: self.last_line_index() });
        }
        let to = to.min(self.lines.len()).max(from);
        for (offset, line) in self.lines[from..to].iter().enumerate() {
            visitor(from + offset, line);
        }
        Ok(())
    }

    fn empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    fn optimize(&mut self) {
        self.lines.shrink_to_fit();
    }
}

#[cfg(feature = "rope")]
mod rope_block {
    use std::borrow::Cow;

    use super::{TextBlock, TextBlockError};
    use ropey::Rope;

    /// A [`TextBlock`] backed by [`ropey::Rope`], for documents large enough
    /// that per-line `Vec<u8>` churn shows up in profiles.
    ///
    /// Ropey operates on `char`s, so lines are stored and returned as UTF-8;
    /// a block built this way is only usable with `Utf8Encoding`.
    #[derive(Debug, Default, Clone)]
    pub struct RopeTextBlock {
        rope: Rope,
    }

    impl RopeTextBlock {
        pub fn new() -> Self {
            Self { rope: Rope::new() }
        }

        fn check_index(&self, index: usize) -> Result<(), TextBlockError> {
            if index > self.last_line_index() {
                Err(TextBlockError::OutOfRange { index, last_line: self.last_line_index() })
            } else {
                Ok(())
            }
        }

        fn line_str(&self, index: usize) -> String {
            let line = self.rope.line(index);
            let mut s: String = line.into();
            while s.ends_with(['\n', '\r']) {
                s.pop();
            }
            s
        }
    }

    impl TextBlock for RopeTextBlock {
        fn last_line_index(&self) -> usize {
            self.rope.len_lines().saturating_sub(1).max(0)
        }

        fn line(&self, index: usize) -> Result<Cow<'_, [u8]>, TextBlockError> {
            self.check_index(index)?;
            Ok(Cow::Owned(self.line_str(index).into_bytes()))
        }

        fn set_line(&mut self, index: usize, content: Vec<u8>) -> Result<(), TextBlockError> {
            self.check_index(index)?;
            let start = self.rope.line_to_char(index);
            let end = if index == self.last_line_index() {
                self.rope.len_chars()
            } else {
                self.rope.line_to_char(index + 1)
            };
            self.rope.remove(start..end);
            let text = String::from_utf8_lossy(&content);
            self.rope.insert(start, &text);
            Ok(())
        }

        fn insert_line(&mut self, index: usize, content: Vec<u8>) -> Result<(), TextBlockError> {
            if index > self.rope.len_lines() {
                return Err(TextBlockError::OutOfRange { index, last_line: self.last_line_index() });
            }
            let at = if index >= self.rope.len_lines() {
                self.rope.len_chars()
            } else {
                self.rope.line_to_char(index)
            };
            let mut text = String::from_utf8_lossy(&content).into_owned();
            text.push('\n');
            self.rope.insert(at, &text);
            Ok(())
        }

        fn erase_line(&mut self, index: usize) -> Result<(), TextBlockError> {
            self.check_index(index)?;
            let start = self.rope.line_to_char(index);
            let end = if index + 1 >= self.rope.len_lines() {
                self.rope.len_chars()
            } else {
                self.rope.line_to_char(index + 1)
            };
            self.rope.remove(start..end);
            Ok(())
        }

        fn visit(
            &self,
            from: usize,
            to: usize,
            visitor: &mut dyn FnMut(usize, &[u8]),
        ) -> Result<(), TextBlockError> {
            if from > self.rope.len_lines() {
                return Err(TextBlockError::OutOfRange { index: from, last_line: self.last_line_index() });
            }
            let to = to.min(self.rope.len_lines()).max(from);
            for index in from..to {
                let s = self.line_str(index);
                visitor(index, s.as_bytes());
            }
            Ok(())
        }

        fn empty(&self) -> bool {
            self.rope.len_chars() == 0
        }

        fn optimize(&mut self) {
            self.rope.shrink_to_fit();
        }
    }
}

#[cfg(feature = "rope")]
pub use rope_block::RopeTextBlock;
