//! Codepoint/byte indexing for a pluggable text encoding.
//!
//! An [`Encoding`] lets the rest of the core address text by codepoint while
//! storing it as raw bytes. Two implementations are provided: [`Utf8Encoding`]
//! and [`Utf32LeEncoding`]; callers needing a third variant implement the
//! trait directly.

use thiserror::Error;

/// Failure decoding a byte sequence under a particular [`Encoding`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid byte sequence at offset {offset}")]
    InvalidByteSequence { offset: usize },
}

/// A codec polymorphic over the underlying byte representation of text.
///
/// Implementations are assumed total over well-formed input: a `view` passed
/// to `codepoint_count`/`codepoint_at`/`iterate` is expected to already be
/// valid under this encoding (the owning text block only ever stores bytes it
/// produced itself via `encode_*`). Malformed input degrades gracefully
/// rather than panicking.
pub trait Encoding: Send + Sync {
    /// Number of codepoints represented by `view`.
    fn codepoint_count(&self, view: &[u8]) -> usize;

    /// Byte offset and byte length of the codepoint at `index`, or `None` if
    /// `index` is out of range.
    fn codepoint_at(&self, view: &[u8], index: usize) -> Option<(usize, usize)>;

    /// Invoke `cb(byte_offset, byte_length, char)` for every codepoint in
    /// order. Returns whether iteration ran to completion (`cb` returning
    /// `false` aborts early).
    fn iterate(&self, view: &[u8], cb: &mut dyn FnMut(usize, usize, char) -> bool) -> bool;

    /// Encode a single character.
    fn encode_char(&self, c: char) -> Vec<u8>;

    /// Encode a string.
    fn encode_str(&self, s: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(s.len());
        for c in s.chars() {
            out.extend(self.encode_char(c));
        }
        out
    }

    /// Decode a byte sequence into a `String`, failing on the first
    /// malformed unit.
    fn decode(&self, bytes: &[u8]) -> Result<String, EncodingError>;
}

/// UTF-8, the default encoding for on-disk and in-memory lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Encoding;

impl Encoding for Utf8Encoding {
    fn codepoint_count(&self, view: &[u8]) -> usize {
        match std::str::from_utf8(view) {
            Ok(s) => s.chars().count(),
            Err(_) => 0,
        }
    }

    fn codepoint_at(&self, view: &[u8], index: usize) -> Option<(usize, usize)> {
        let s = std::str::from_utf8(view).ok()?;
        s.char_indices()
            .nth(index)
            .map(|(offset, c)| (offset, c.len_utf8()))
    }

    fn iterate(&self, view: &[u8], cb: &mut dyn FnMut(usize, usize, char) -> bool) -> bool {
        let s = match std::str::from_utf8(view) {
            Ok(s) => s,
            Err(_) => return false,
        };
        for (offset, c) in s.char_indices() {
            if !cb(offset, c.len_utf8(), c) {
                return false;
            }
        }
        true
    }

    fn encode_char(&self, c: char) -> Vec<u8> {
        let mut buf = [0u8; 4];
        c.encode_utf8(&mut buf).as_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, EncodingError> {
        std::str::from_utf8(bytes)
            .map(|s| s.to_owned())
            .map_err(|e| EncodingError::InvalidByteSequence {
                offset: e.valid_up_to(),
            })
    }
}

/// UTF-32, little-endian, one 4-byte code unit per codepoint. Surrogate
/// halves and values above `0x10FFFF` are rejected at decode time.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf32LeEncoding;

impl Utf32LeEncoding {
    fn char_at_unit(view: &[u8], unit: usize) -> Option<char> {
        let start = unit * 4;
        let bytes: [u8; 4] = view.get(start..start + 4)?.try_into().ok()?;
        char::from_u32(u32::from_le_bytes(bytes))
    }
}

impl Encoding for Utf32LeEncoding {
    fn codepoint_count(&self, view: &[u8]) -> usize {
        view.len() / 4
    }

    fn codepoint_at(&self, view: &[u8], index: usize) -> Option<(usize, usize)> {
        Self::char_at_unit(view, index)?;
        Some((index * 4, 4))
    }

    fn iterate(&self, view: &[u8], cb: &mut dyn FnMut(usize, usize, char) -> bool) -> bool {
        let count = self.codepoint_count(view);
        for i in 0..count {
            let Some(c) = Self::char_at_unit(view, i) else {
                return false;
            };
            if !cb(i * 4, 4, c) {
                return false;
            }
        }
        true
    }

    fn encode_char(&self, c: char) -> Vec<u8> {
        (c as u32).to_le_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, EncodingError> {
        if bytes.len() % 4 != 0 {
            return Err(EncodingError::InvalidByteSequence {
                offset: bytes.len() - bytes.len() % 4,
            });
        }
        let mut out = String::with_capacity(bytes.len() / 4);
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            let unit: [u8; 4] = chunk.try_into().unwrap();
            let code = u32::from_le_bytes(unit);
            match char::from_u32(code) {
                Some(c) => out.push(c),
                None => return Err(EncodingError::InvalidByteSequence { offset: i * 4 }),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_codepoint_count_ascii() {
        let enc = Utf8Encoding;
        assert_eq!(enc.codepoint_count(b"hello"), 5);
    }

    #[test]
    fn utf8_codepoint_count_multibyte() {
        let enc = Utf8Encoding;
        let s = "a\u{1F600}b"; // a, emoji (4 bytes), b
        assert_eq!(enc.codepoint_count(s.as_bytes()), 3);
    }

    #[test]
    fn utf8_codepoint_at() {
        let enc = Utf8Encoding;
        let s = "a\u{1F600}b";
        assert_eq!(enc.codepoint_at(s.as_bytes(), 0), Some((0, 1)));
        assert_eq!(enc.codepoint_at(s.as_bytes(), 1), Some((1, 4)));
        assert_eq!(enc.codepoint_at(s.as_bytes(), 2), Some((5, 1)));
        assert_eq!(enc.codepoint_at(s.as_bytes(), 3), None);
    }

    #[test]
    fn utf8_iterate_aborts_on_false() {
        let enc = Utf8Encoding;
        let mut seen = vec![];
        let completed = enc.iterate(b"abc", &mut |_, _, c| {
            seen.push(c);
            c != 'b'
        });
        assert!(!completed);
        assert_eq!(seen, vec!['a', 'b']);
    }

    #[test]
    fn utf8_roundtrip() {
        let enc = Utf8Encoding;
        let encoded = enc.encode_str("héllo");
        assert_eq!(enc.decode(&encoded).unwrap(), "héllo");
    }

    #[test]
    fn utf8_decode_invalid() {
        let enc = Utf8Encoding;
        assert!(enc.decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn utf32le_roundtrip() {
        let enc = Utf32LeEncoding;
        let encoded = enc.encode_str("a\u{1F600}b");
        assert_eq!(enc.codepoint_count(&encoded), 3);
        assert_eq!(enc.decode(&encoded).unwrap(), "a\u{1F600}b");
    }

    #[test]
    fn utf32le_codepoint_at() {
        let enc = Utf32LeEncoding;
        let encoded = enc.encode_str("xy");
        assert_eq!(enc.codepoint_at(&encoded, 0), Some((0, 4)));
        assert_eq!(enc.codepoint_at(&encoded, 1), Some((4, 4)));
        assert_eq!(enc.codepoint_at(&encoded, 2), None);
    }

    #[test]
    fn utf32le_decode_misaligned() {
        let enc = Utf32LeEncoding;
        assert!(enc.decode(&[0, 0, 0]).is_err());
    }
}
