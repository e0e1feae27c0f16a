//! Pure editing operations over a [`TextBlock`], parameterized by
//! [`Encoding`]. These never know about transactions, streams, or cursors —
//! they just mutate a block and report the resulting position.

use sloked_encoding::Encoding;
use sloked_text::{TextBlock, TextBlockError, TextPosition};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditingError {
    #[error(transparent)]
    Block(#[from] TextBlockError),
}

/// Byte offset of codepoint `column` in `line`, clamped to `line.len()` when
/// `column` is past the end — the shared helper behind every primitive that
/// needs to turn a column into a splice point.
fn offset(line: &[u8], column: usize, encoding: &dyn Encoding) -> usize {
    match encoding.codepoint_at(line, column) {
        Some((byte_offset, _)) => byte_offset,
        None => line.len(),
    }
}

fn clamp(text: &dyn TextBlock, encoding: &dyn Encoding, pos: TextPosition) -> Result<TextPosition, EditingError> {
    let line_idx = pos.line.min(text.last_line_index());
    let line = text.line(line_idx)?;
    let column = pos.column.min(encoding.codepoint_count(&line));
    Ok(TextPosition::new(line_idx, column))
}

/// Insert `content` (already encoded) at `position`, returning the
/// resulting cursor position.
pub fn insert(
    text: &mut dyn TextBlock,
    encoding: &dyn Encoding,
    position: TextPosition,
    content: &[u8],
) -> Result<TextPosition, EditingError> {
    let current = text.line(position.line)?.into_owned();
    let count = encoding.codepoint_count(&current);
    let mut updated = Vec::with_capacity(current.len() + content.len());
    if position.column < count {
        let at = offset(&current, position.column, encoding);
        updated.extend_from_slice(&current[..at]);
        updated.extend_from_slice(content);
        updated.extend_from_slice(&current[at..]);
    } else {
        updated.extend_from_slice(&current);
        updated.extend_from_slice(content);
    }
    text.set_line(position.line, updated)?;
    Ok(TextPosition::new(position.line, position.column + encoding.codepoint_count(content)))
}

/// Split the line at `position`, pushing everything from `position` onward
/// (preceded by `content`, if any) onto a new line below.
pub fn newline(
    text: &mut dyn TextBlock,
    encoding: &dyn Encoding,
    position: TextPosition,
    content: &[u8],
) -> Result<TextPosition, EditingError> {
    let current = text.line(position.line)?.into_owned();
    let count = encoding.codepoint_count(&current);
    if position.column < count {
        let at = offset(&current, position.column, encoding);
        let (head, tail) = current.split_at(at);
        text.set_line(position.line, head.to_vec())?;
        let mut new_line = content.to_vec();
        new_line.extend_from_slice(tail);
        text.insert_line(position.line + 1, new_line)?;
    } else {
        text.insert_line(position.line + 1, content.to_vec())?;
    }
    Ok(TextPosition::new(position.line + 1, 0))
}

/// Delete the codepoint before `position`, merging with the previous line
/// if `position.column == 0`. A no-op at the start of the document.
pub fn delete_backward(
    text: &mut dyn TextBlock,
    encoding: &dyn Encoding,
    position: TextPosition,
) -> Result<TextPosition, EditingError> {
    if position.column > 0 {
        let current = text.line(position.line)?.into_owned();
        let count = encoding.codepoint_count(&current);
        let before = offset(&current, position.column - 1, encoding);
        let updated = if position.column < count {
            let after = offset(&current, position.column, encoding);
            let mut updated = current[..before].to_vec();
            updated.extend_from_slice(&current[after..]);
            updated
        } else {
            current[..before].to_vec()
        };
        text.set_line(position.line, updated)?;
        Ok(TextPosition::new(position.line, position.column - 1))
    } else if position.line > 0 {
        let previous = text.line(position.line - 1)?.into_owned();
        let current = text.line(position.line)?.into_owned();
        let previous_count = encoding.codepoint_count(&previous);
        let mut merged = previous.clone();
        merged.extend_from_slice(&current);
        text.set_line(position.line - 1, merged)?;
        text.erase_line(position.line)?;
        Ok(TextPosition::new(position.line - 1, previous_count))
    } else {
        Ok(position)
    }
}

/// Delete the codepoint at `position`, merging with the next line if
/// `position` is at the end of its line. A no-op at the end of document.
pub fn delete_forward(
    text: &mut dyn TextBlock,
    encoding: &dyn Encoding,
    position: TextPosition,
) -> Result<TextPosition, EditingError> {
    let current = text.line(position.line)?.into_owned();
    let width = encoding.codepoint_count(&current);
    if position.column + 1 < width {
        let before = offset(&current, position.column, encoding);
        let after = offset(&current, position.column + 1, encoding);
        let mut updated = current[..before].to_vec();
        updated.extend_from_slice(&current[after..]);
        text.set_line(position.line, updated)?;
    } else if position.column + 1 == width {
        let before = offset(&current, position.column, encoding);
        text.set_line(position.line, current[..before].to_vec())?;
    } else if position.column == width && position.line < text.last_line_index() {
        let next = text.line(position.line + 1)?.into_owned();
        let mut merged = current;
        merged.extend_from_slice(&next);
        text.set_line(position.line, merged)?;
        text.erase_line(position.line + 1)?;
    }
    Ok(position)
}

/// Remove every codepoint in `[from, to)`, joining the remainder of `from`'s
/// and `to`'s lines and erasing everything strictly between them. Returns
/// `from`, clamped neither here nor by the caller (callers clamp via
/// [`clamp_range`] first, matching the original's factory behaviour).
pub fn clear_region(
    text: &mut dyn TextBlock,
    encoding: &dyn Encoding,
    from: TextPosition,
    to: TextPosition,
) -> Result<TextPosition, EditingError> {
    if !(from < to) {
        return Ok(from);
    }
    if from.line == to.line {
        if from.line <= text.last_line_index() {
            let line = text.line(from.line)?.into_owned();
            let from_offset = offset(&line, from.column, encoding);
            let to_offset = offset(&line, to.column, encoding);
            let mut updated = line[..from_offset].to_vec();
            updated.extend_from_slice(&line[to_offset..]);
            text.set_line(from.line, updated)?;
        }
        return Ok(from);
    }

    if from.line <= text.last_line_index() {
        let first_line = text.line(from.line)?.into_owned();
        let last_line = if to.line <= text.last_line_index() {
            let line = text.line(to.line)?.into_owned();
            text.erase_line(to.line)?;
            line
        } else {
            Vec::new()
        };
        let from_offset = offset(&first_line, from.column, encoding);
        let to_offset = offset(&last_line, to.column, encoding);
        let mut updated = first_line[..from_offset].to_vec();
        updated.extend_from_slice(&last_line[to_offset..]);
        text.set_line(from.line, updated)?;
    }

    // Lines strictly between `from` and `to` (the `to` line having already
    // been consumed above) are erased from the bottom up so indices above
    // the erase point stay valid.
    let mut line = to.line.saturating_sub(1);
    while line > from.line {
        if line <= text.last_line_index() {
            text.erase_line(line)?;
        }
        line -= 1;
    }
    Ok(from)
}

/// Read (without mutating) the text in `[from, to)`, one `Vec<u8>` entry per
/// covered line.
pub fn read(
    text: &dyn TextBlock,
    encoding: &dyn Encoding,
    from: TextPosition,
    to: TextPosition,
) -> Result<Vec<Vec<u8>>, EditingError> {
    let mut result = Vec::new();
    if from.line == to.line {
        if from.line <= text.last_line_index() {
            let line = text.line(from.line)?;
            let from_offset = offset(&line, from.column, encoding);
            let to_offset = offset(&line, to.column, encoding);
            result.push(line[from_offset..to_offset].to_vec());
        }
        return Ok(result);
    }

    let last_line = to.line.min(text.last_line_index());
    for idx in from.line..=last_line {
        let line = text.line(idx)?;
        if idx == from.line {
            let from_offset = offset(&line, from.column, encoding);
            result.push(line[from_offset..].to_vec());
        } else if idx == to.line {
            let to_offset = offset(&line, to.column, encoding);
            result.push(line[..to_offset].to_vec());
        } else {
            result.push(line.into_owned());
        }
    }
    Ok(result)
}

/// Clamp `from`/`to` into valid document range, the way the transaction
/// factory clamps a requested region before recording a `ClearRegion`.
pub fn clamp_range(
    text: &dyn TextBlock,
    encoding: &dyn Encoding,
    from: TextPosition,
    to: TextPosition,
) -> Result<(TextPosition, TextPosition), EditingError> {
    Ok((clamp(text, encoding, from)?, clamp(text, encoding, to)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sloked_encoding::Utf8Encoding;
    use sloked_text::PlainTextBlock;

    fn block(lines: &[&str]) -> PlainTextBlock {
        PlainTextBlock::from_lines(lines.iter().map(|l| l.as_bytes().to_vec()).collect())
    }

    #[test]
    fn insert_mid_line() {
        let mut text = block(&["hello world"]);
        let enc = Utf8Encoding;
        let pos = insert(&mut text, &enc, TextPosition::new(0, 5), b",").unwrap();
        assert_eq!(pos, TextPosition::new(0, 6));
        assert_eq!(text.line(0).unwrap().as_ref(), b"hello, world");
    }

    #[test]
    fn insert_past_end_appends() {
        let mut text = block(&["abc"]);
        let enc = Utf8Encoding;
        let pos = insert(&mut text, &enc, TextPosition::new(0, 99), b"def").unwrap();
        assert_eq!(pos, TextPosition::new(0, 102));
        assert_eq!(text.line(0).unwrap().as_ref(), b"abcdef");
    }

    #[test]
    fn newline_splits_line() {
        let mut text = block(&["hello world"]);
        let enc = Utf8Encoding;
        let pos = newline(&mut text, &enc, TextPosition::new(0, 5), b"").unwrap();
        assert_eq!(pos, TextPosition::new(1, 0));
        assert_eq!(text.line(0).unwrap().as_ref(), b"hello");
        assert_eq!(text.line(1).unwrap().as_ref(), b" world");
    }

    #[test]
    fn delete_backward_merges_lines_at_column_zero() {
        let mut text = block(&["abc", "def"]);
        let enc = Utf8Encoding;
        let pos = delete_backward(&mut text, &enc, TextPosition::new(1, 0)).unwrap();
        assert_eq!(pos, TextPosition::new(0, 3));
        assert_eq!(text.last_line_index(), 0);
        assert_eq!(text.line(0).unwrap().as_ref(), b"abcdef");
    }

    #[test]
    fn delete_backward_at_document_start_is_noop() {
        let mut text = block(&["abc"]);
        let enc = Utf8Encoding;
        let pos = delete_backward(&mut text, &enc, TextPosition::new(0, 0)).unwrap();
        assert_eq!(pos, TextPosition::new(0, 0));
        assert_eq!(text.line(0).unwrap().as_ref(), b"abc");
    }

    #[test]
    fn delete_forward_merges_lines_at_eol() {
        let mut text = block(&["abc", "def"]);
        let enc = Utf8Encoding;
        delete_forward(&mut text, &enc, TextPosition::new(0, 3)).unwrap();
        assert_eq!(text.last_line_index(), 0);
        assert_eq!(text.line(0).unwrap().as_ref(), b"abcdef");
    }

    #[test]
    fn clear_region_same_line() {
        let mut text = block(&["hello world"]);
        let enc = Utf8Encoding;
        let pos = clear_region(&mut text, &enc, TextPosition::new(0, 5), TextPosition::new(0, 11)).unwrap();
        assert_eq!(pos, TextPosition::new(0, 5));
        assert_eq!(text.line(0).unwrap().as_ref(), b"hello");
    }

    #[test]
    fn clear_region_across_lines() {
        let mut text = block(&["abc", "def", "ghi"]);
        let enc = Utf8Encoding;
        clear_region(&mut text, &enc, TextPosition::new(0, 1), TextPosition::new(2, 2)).unwrap();
        assert_eq!(text.last_line_index(), 0);
        assert_eq!(text.line(0).unwrap().as_ref(), b"ai");
    }

    #[test]
    fn read_across_lines() {
        let text = block(&["abc", "def", "ghi"]);
        let enc = Utf8Encoding;
        let lines = read(&text, &enc, TextPosition::new(0, 1), TextPosition::new(2, 2)).unwrap();
        assert_eq!(lines, vec![b"bc".to_vec(), b"def".to_vec(), b"gh".to_vec()]);
    }
}
