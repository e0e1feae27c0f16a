//! [`NewlineStyle`]: the line terminator a document was opened with,
//! preserved across `save` so round-tripping a file never silently
//! normalizes its line endings.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewlineStyle {
    Lf,
    Crlf,
    Cr,
    LfCr,
}

impl NewlineStyle {
    pub fn bytes(self) -> &'static [u8] {
        match self {
            NewlineStyle::Lf => b"\n",
            NewlineStyle::Crlf => b"\r\n",
            NewlineStyle::Cr => b"\r",
            NewlineStyle::LfCr => b"\n\r",
        }
    }

    /// Split `content` on this style's terminator. The final line never has
    /// a trailing terminator; a trailing terminator in `content` produces an
    /// empty final line, matching how `PlainTextBlock` represents an empty
    /// last line.
    pub fn split(self, content: &[u8]) -> Vec<Vec<u8>> {
        let sep = self.bytes();
        let mut lines = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i + sep.len() <= content.len() {
            if &content[i..i + sep.len()] == sep {
                lines.push(content[start..i].to_vec());
                i += sep.len();
                start = i;
            } else {
                i += 1;
            }
        }
        lines.push(content[start..].to_vec());
        lines
    }

    pub fn join(self, lines: &[Vec<u8>]) -> Vec<u8> {
        let sep = self.bytes();
        let mut out = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(sep);
            }
            out.extend_from_slice(line);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_then_join_round_trips() {
        let content = b"one\r\ntwo\r\nthree";
        let lines = NewlineStyle::Crlf.split(content);
        assert_eq!(lines, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
        assert_eq!(NewlineStyle::Crlf.join(&lines), content);
    }

    #[test]
    fn empty_content_is_a_single_empty_line() {
        assert_eq!(NewlineStyle::Lf.split(b""), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn trailing_terminator_yields_trailing_empty_line() {
        assert_eq!(NewlineStyle::Lf.split(b"a\n"), vec![b"a".to_vec(), Vec::new()]);
    }
}
