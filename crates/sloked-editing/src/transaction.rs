//! [`Transaction`]: a recorded edit, capable of being committed, rolled
//! back, and rebased (`update`) onto a patch produced by a transaction that
//! landed ahead of it in a shared stream.

use sloked_encoding::Encoding;
use sloked_text::{PatchMap, PositionDelta, TextBlock, TextPosition};

use crate::primitives::{self, EditingError};

/// What a delete operation removed, captured before it runs so the
/// transaction can reverse itself later without re-reading text that may no
/// longer hold the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteCapture {
    /// A single codepoint vanished without changing the line count.
    WithinLine { content: Vec<u8> },
    /// Two lines merged into one. `width` is the codepoint length of
    /// whichever line absorbed the other's content (see call sites).
    MergedLine { width: usize },
    /// Nothing happened: start-of-document (`DeleteBackward`) or
    /// end-of-document (`DeleteForward`).
    Noop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionPayload {
    Insert { content: Vec<u8> },
    Newline { content: Vec<u8> },
    DeleteBackward(DeleteCapture),
    DeleteForward(DeleteCapture),
    ClearRegion { to: TextPosition, content: Vec<Vec<u8>> },
    Batch(Vec<Transaction>),
}

/// A single recorded edit, anchored at the position it was issued from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub anchor: TextPosition,
    pub payload: TransactionPayload,
}

fn codepoint_at_or_end(line: &[u8], column: usize, encoding: &dyn Encoding) -> usize {
    match encoding.codepoint_at(line, column) {
        Some((offset, _)) => offset,
        None => line.len(),
    }
}

impl Transaction {
    pub fn insert(anchor: TextPosition, content: Vec<u8>) -> Self {
        Self { anchor, payload: TransactionPayload::Insert { content } }
    }

    pub fn newline(anchor: TextPosition, content: Vec<u8>) -> Self {
        Self { anchor, payload: TransactionPayload::Newline { content } }
    }

    /// Record a backward delete at `anchor`, capturing what it will remove.
    pub fn delete_backward(
        text: &dyn TextBlock,
        encoding: &dyn Encoding,
        anchor: TextPosition,
    ) -> Result<Self, EditingError> {
        let capture = if anchor.column > 0 {
            let line = text.line(anchor.line)?;
            let before = codepoint_at_or_end(&line, anchor.column - 1, encoding);
            let after = codepoint_at_or_end(&line, anchor.column, encoding);
            DeleteCapture::WithinLine { content: line[before..after].to_vec() }
        } else if anchor.line > 0 {
            let previous = text.line(anchor.line - 1)?;
            DeleteCapture::MergedLine { width: encoding.codepoint_count(&previous) }
        } else {
            DeleteCapture::Noop
        };
        Ok(Self { anchor, payload: TransactionPayload::DeleteBackward(capture) })
    }

    /// Record a forward delete at `anchor`, capturing what it will remove.
    pub fn delete_forward(
        text: &dyn TextBlock,
        encoding: &dyn Encoding,
        anchor: TextPosition,
    ) -> Result<Self, EditingError> {
        let line = text.line(anchor.line)?;
        let width = encoding.codepoint_count(&line);
        let capture = if anchor.column < width {
            let at = codepoint_at_or_end(&line, anchor.column, encoding);
            let after = codepoint_at_or_end(&line, anchor.column + 1, encoding);
            DeleteCapture::WithinLine { content: line[at..after].to_vec() }
        } else if anchor.column == width && anchor.line < text.last_line_index() {
            DeleteCapture::MergedLine { width }
        } else {
            DeleteCapture::Noop
        };
        Ok(Self { anchor, payload: TransactionPayload::DeleteForward(capture) })
    }

    /// Record a region clear, clamping `from`/`to` into range and capturing
    /// the removed content for rollback.
    pub fn clear_region(
        text: &dyn TextBlock,
        encoding: &dyn Encoding,
        from: TextPosition,
        to: TextPosition,
    ) -> Result<Self, EditingError> {
        let (from, to) = primitives::clamp_range(text, encoding, from, to)?;
        let content = if from < to {
            primitives::read(text, encoding, from, to)?
        } else {
            Vec::new()
        };
        Ok(Self { anchor: from, payload: TransactionPayload::ClearRegion { to, content } })
    }

    pub fn batch(transactions: Vec<Transaction>) -> Self {
        let anchor = transactions.first().map(|t| t.anchor).unwrap_or_default();
        Self { anchor, payload: TransactionPayload::Batch(transactions) }
    }

    /// Apply this transaction to `text`, returning the resulting cursor
    /// position and the patch describing how other anchored positions move.
    pub fn commit(
        &self,
        text: &mut dyn TextBlock,
        encoding: &dyn Encoding,
    ) -> Result<(TextPosition, PatchMap), EditingError> {
        let anchor = self.anchor;
        match &self.payload {
            TransactionPayload::Insert { content } => {
                let pos = primitives::insert(text, encoding, anchor, content)?;
                let width = encoding.codepoint_count(content) as i64;
                let patch = PatchMap::line_local(anchor, PositionDelta::new(0, width), PositionDelta::zero());
                Ok((pos, patch))
            }
            TransactionPayload::Newline { content } => {
                let pos = primitives::newline(text, encoding, anchor, content)?;
                let width = encoding.codepoint_count(content) as i64;
                let same_line = PositionDelta::new(1, width - anchor.column as i64);
                let patch = PatchMap::line_local(anchor, same_line, PositionDelta::new(1, 0));
                Ok((pos, patch))
            }
            TransactionPayload::DeleteBackward(capture) => {
                let pos = primitives::delete_backward(text, encoding, anchor)?;
                let patch = match capture {
                    DeleteCapture::WithinLine { .. } => {
                        PatchMap::line_local(anchor, PositionDelta::new(0, -1), PositionDelta::zero())
                    }
                    DeleteCapture::MergedLine { width } => PatchMap::line_local(
                        TextPosition::new(anchor.line, 0),
                        PositionDelta::new(-1, *width as i64),
                        PositionDelta::new(-1, 0),
                    ),
                    DeleteCapture::Noop => PatchMap::identity(),
                };
                Ok((pos, patch))
            }
            TransactionPayload::DeleteForward(capture) => {
                primitives::delete_forward(text, encoding, anchor)?;
                let patch = match capture {
                    DeleteCapture::WithinLine { .. } => PatchMap::line_local(
                        TextPosition::new(anchor.line, anchor.column + 1),
                        PositionDelta::new(0, -1),
                        PositionDelta::zero(),
                    ),
                    DeleteCapture::MergedLine { width } => PatchMap::line_local(
                        TextPosition::new(anchor.line + 1, 0),
                        PositionDelta::new(-1, *width as i64),
                        PositionDelta::new(-1, 0),
                    ),
                    DeleteCapture::Noop => PatchMap::identity(),
                };
                Ok((anchor, patch))
            }
            TransactionPayload::ClearRegion { to, .. } => {
                let pos = primitives::clear_region(text, encoding, anchor, *to)?;
                let tail = PositionDelta::new(anchor.line as i64 - to.line as i64, 0);
                let patch = PatchMap::collapse_region(anchor, *to, tail);
                Ok((pos, patch))
            }
            TransactionPayload::Batch(transactions) => {
                let mut patch = PatchMap::identity();
                let mut pos = anchor;
                for t in transactions {
                    let (p, step) = t.commit(text, encoding)?;
                    pos = p;
                    patch = patch.compose(step);
                }
                Ok((pos, patch))
            }
        }
    }

    /// Reverse this transaction's effect on `text`, returning the resulting
    /// cursor position and the patch describing the reversal.
    pub fn rollback(
        &self,
        text: &mut dyn TextBlock,
        encoding: &dyn Encoding,
    ) -> Result<(TextPosition, PatchMap), EditingError> {
        let anchor = self.anchor;
        match &self.payload {
            TransactionPayload::Insert { content } => {
                let width = encoding.codepoint_count(content) as i64;
                let end = TextPosition::new(anchor.line, (anchor.column as i64 + width) as usize);
                primitives::clear_region(text, encoding, anchor, end)?;
                let patch = PatchMap::line_local(anchor, PositionDelta::new(0, -width), PositionDelta::zero());
                Ok((anchor, patch))
            }
            TransactionPayload::Newline { content } => {
                let width = encoding.codepoint_count(content) as usize;
                let next_line = anchor.line + 1;
                primitives::clear_region(
                    text,
                    encoding,
                    TextPosition::new(next_line, 0),
                    TextPosition::new(next_line, width),
                )?;
                let pos = primitives::delete_backward(text, encoding, TextPosition::new(next_line, 0))?;
                let same_line =
                    PositionDelta::new(-1, anchor.column as i64 - width as i64);
                let patch = PatchMap::line_local(TextPosition::new(next_line, 0), same_line, PositionDelta::new(-1, 0));
                Ok((pos, patch))
            }
            TransactionPayload::DeleteBackward(capture) => match capture {
                DeleteCapture::WithinLine { content } => {
                    let at = TextPosition::new(anchor.line, anchor.column - 1);
                    primitives::insert(text, encoding, at, content)?;
                    let patch = PatchMap::line_local(at, PositionDelta::new(0, 1), PositionDelta::zero());
                    Ok((anchor, patch))
                }
                DeleteCapture::MergedLine { width } => {
                    let at = TextPosition::new(anchor.line - 1, *width);
                    primitives::newline(text, encoding, at, &[])?;
                    let same_line = PositionDelta::new(1, -(*width as i64));
                    let patch = PatchMap::line_local(at, same_line, PositionDelta::new(1, 0));
                    Ok((anchor, patch))
                }
                DeleteCapture::Noop => Ok((anchor, PatchMap::identity())),
            },
            TransactionPayload::DeleteForward(capture) => match capture {
                DeleteCapture::WithinLine { content } => {
                    primitives::insert(text, encoding, anchor, content)?;
                    let patch = PatchMap::line_local(anchor, PositionDelta::new(0, 1), PositionDelta::zero());
                    Ok((anchor, patch))
                }
                DeleteCapture::MergedLine { width } => {
                    let at = TextPosition::new(anchor.line, *width);
                    primitives::newline(text, encoding, at, &[])?;
                    let same_line = PositionDelta::new(1, -(*width as i64));
                    let patch = PatchMap::line_local(at, same_line, PositionDelta::new(1, 0));
                    Ok((anchor, patch))
                }
                DeleteCapture::Noop => Ok((anchor, PatchMap::identity())),
            },
            TransactionPayload::ClearRegion { content, .. } => {
                rollback_clear_region(text, encoding, anchor, content)
            }
            TransactionPayload::Batch(transactions) => {
                let mut patch = PatchMap::identity();
                let mut pos = anchor;
                for t in transactions.iter().rev() {
                    let (p, step) = t.rollback(text, encoding)?;
                    pos = p;
                    patch = patch.compose(step);
                }
                Ok((pos, patch))
            }
        }
    }

    /// Rebase this transaction's anchor (and any captured undo data) onto a
    /// patch produced by a transaction that committed ahead of it. Delete
    /// and clear-region captures are re-derived against the live `text`
    /// rather than shifted, since the bytes at the new anchor may differ
    /// from what was captured at the old one.
    pub fn update(
        &self,
        patch: &PatchMap,
        text: &dyn TextBlock,
        encoding: &dyn Encoding,
    ) -> Result<Transaction, EditingError> {
        let anchor = patch.apply(self.anchor);
        let payload = match &self.payload {
            TransactionPayload::Insert { content } => TransactionPayload::Insert { content: content.clone() },
            TransactionPayload::Newline { content } => TransactionPayload::Newline { content: content.clone() },
            TransactionPayload::DeleteBackward(_) => {
                return Transaction::delete_backward(text, encoding, anchor);
            }
            TransactionPayload::DeleteForward(_) => {
                return Transaction::delete_forward(text, encoding, anchor);
            }
            TransactionPayload::ClearRegion { to, .. } => {
                return Transaction::clear_region(text, encoding, anchor, patch.apply(*to));
            }
            TransactionPayload::Batch(transactions) => {
                let rebased = transactions
                    .iter()
                    .map(|t| t.update(patch, text, encoding))
                    .collect::<Result<Vec<_>, _>>()?;
                TransactionPayload::Batch(rebased)
            }
        };
        Ok(Transaction { anchor, payload })
    }

    /// The patch this transaction would produce on commit, without
    /// mutating anything. Listeners that only need to rebase a position
    /// (rather than mutate a [`TextBlock`] of their own) use this instead
    /// of [`Transaction::commit`].
    pub fn commit_patch(&self, encoding: &dyn Encoding) -> PatchMap {
        let anchor = self.anchor;
        match &self.payload {
            TransactionPayload::Insert { content } => {
                let width = encoding.codepoint_count(content) as i64;
                PatchMap::line_local(anchor, PositionDelta::new(0, width), PositionDelta::zero())
            }
            TransactionPayload::Newline { content } => {
                let width = encoding.codepoint_count(content) as i64;
                let same_line = PositionDelta::new(1, width - anchor.column as i64);
                PatchMap::line_local(anchor, same_line, PositionDelta::new(1, 0))
            }
            TransactionPayload::DeleteBackward(capture) => match capture {
                DeleteCapture::WithinLine { .. } => {
                    PatchMap::line_local(anchor, PositionDelta::new(0, -1), PositionDelta::zero())
                }
                DeleteCapture::MergedLine { width } => PatchMap::line_local(
                    TextPosition::new(anchor.line, 0),
                    PositionDelta::new(-1, *width as i64),
                    PositionDelta::new(-1, 0),
                ),
                DeleteCapture::Noop => PatchMap::identity(),
            },
            TransactionPayload::DeleteForward(capture) => match capture {
                DeleteCapture::WithinLine { .. } => PatchMap::line_local(
                    TextPosition::new(anchor.line, anchor.column + 1),
                    PositionDelta::new(0, -1),
                    PositionDelta::zero(),
                ),
                DeleteCapture::MergedLine { width } => PatchMap::line_local(
                    TextPosition::new(anchor.line + 1, 0),
                    PositionDelta::new(-1, *width as i64),
                    PositionDelta::new(-1, 0),
                ),
                DeleteCapture::Noop => PatchMap::identity(),
            },
            TransactionPayload::ClearRegion { to, .. } => {
                let tail = PositionDelta::new(anchor.line as i64 - to.line as i64, 0);
                PatchMap::collapse_region(anchor, *to, tail)
            }
            TransactionPayload::Batch(transactions) => transactions
                .iter()
                .fold(PatchMap::identity(), |acc, t| acc.compose(t.commit_patch(encoding))),
        }
    }

    /// The patch a rollback of this transaction would produce, without
    /// mutating anything.
    pub fn rollback_patch(&self, encoding: &dyn Encoding) -> PatchMap {
        let anchor = self.anchor;
        match &self.payload {
            TransactionPayload::Insert { content } => {
                let width = encoding.codepoint_count(content) as i64;
                PatchMap::line_local(anchor, PositionDelta::new(0, -width), PositionDelta::zero())
            }
            TransactionPayload::Newline { content } => {
                let width = encoding.codepoint_count(content) as i64;
                let next_line = TextPosition::new(anchor.line + 1, 0);
                let same_line = PositionDelta::new(-1, anchor.column as i64 - width);
                PatchMap::line_local(next_line, same_line, PositionDelta::new(-1, 0))
            }
            TransactionPayload::DeleteBackward(capture) => match capture {
                DeleteCapture::WithinLine { .. } => {
                    let at = TextPosition::new(anchor.line, anchor.column - 1);
                    PatchMap::line_local(at, PositionDelta::new(0, 1), PositionDelta::zero())
                }
                DeleteCapture::MergedLine { width } => {
                    let at = TextPosition::new(anchor.line - 1, *width);
                    let same_line = PositionDelta::new(1, -(*width as i64));
                    PatchMap::line_local(at, same_line, PositionDelta::new(1, 0))
                }
                DeleteCapture::Noop => PatchMap::identity(),
            },
            TransactionPayload::DeleteForward(capture) => match capture {
                DeleteCapture::WithinLine { .. } => {
                    PatchMap::line_local(anchor, PositionDelta::new(0, 1), PositionDelta::zero())
                }
                DeleteCapture::MergedLine { width } => {
                    let at = TextPosition::new(anchor.line, *width);
                    let same_line = PositionDelta::new(1, -(*width as i64));
                    PatchMap::line_local(at, same_line, PositionDelta::new(1, 0))
                }
                DeleteCapture::Noop => PatchMap::identity(),
            },
            TransactionPayload::ClearRegion { content, .. } => {
                if content.is_empty() {
                    PatchMap::identity()
                } else if content.len() == 1 {
                    let width = encoding.codepoint_count(&content[0]) as i64;
                    PatchMap::line_local(anchor, PositionDelta::new(0, width), PositionDelta::zero())
                } else {
                    let n = content.len();
                    let last_width = encoding.codepoint_count(&content[n - 1]) as i64;
                    let lines_added = (n - 1) as i64;
                    let same_line = PositionDelta::new(lines_added, last_width - anchor.column as i64);
                    PatchMap::line_local(anchor, same_line, PositionDelta::new(lines_added, 0))
                }
            }
            TransactionPayload::Batch(transactions) => transactions
                .iter()
                .rev()
                .fold(PatchMap::identity(), |acc, t| acc.compose(t.rollback_patch(encoding))),
        }
    }
}

fn rollback_clear_region(
    text: &mut dyn TextBlock,
    encoding: &dyn Encoding,
    anchor: TextPosition,
    content: &[Vec<u8>],
) -> Result<(TextPosition, PatchMap), EditingError> {
    if content.is_empty() {
        return Ok((anchor, PatchMap::identity()));
    }
    if content.len() == 1 {
        primitives::insert(text, encoding, anchor, &content[0])?;
        let width = encoding.codepoint_count(&content[0]) as i64;
        let patch = PatchMap::line_local(anchor, PositionDelta::new(0, width), PositionDelta::zero());
        return Ok((anchor, patch));
    }

    let current = text.line(anchor.line)?.into_owned();
    let split_at = codepoint_at_or_end(&current, anchor.column, encoding);
    let head = current[..split_at].to_vec();
    let tail = current[split_at..].to_vec();

    let n = content.len();
    let mut first_line = head;
    first_line.extend_from_slice(&content[0]);
    text.set_line(anchor.line, first_line)?;
    for (offset, middle) in content[1..n - 1].iter().enumerate() {
        text.insert_line(anchor.line + 1 + offset, middle.clone())?;
    }
    let mut last_line = content[n - 1].clone();
    let last_width = encoding.codepoint_count(&content[n - 1]) as i64;
    last_line.extend_from_slice(&tail);
    text.insert_line(anchor.line + n - 1, last_line)?;

    let lines_added = (n - 1) as i64;
    let same_line = PositionDelta::new(lines_added, last_width - anchor.column as i64);
    let patch = PatchMap::line_local(anchor, same_line, PositionDelta::new(lines_added, 0));
    Ok((anchor, patch))
}
