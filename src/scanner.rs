//! Byte-level cursor over the whole source.
//!
//! The input is copied into a private buffer with a NUL sentinel appended so
//! lookahead past the end reads `0` instead of going out of bounds. End of
//! input is decided by the cursor position, never by the byte value, so a NUL
//! inside the source is still an ordinary byte.

use std::{
  io::{self, Read},
  sync::Arc,
};

use tracing::debug;

pub struct ByteScanner {
  buf: Vec<u8>,
  pos: usize,
  start: usize,
  err: Option<Arc<io::Error>>,
}

impl ByteScanner {
  pub fn new(source: impl Into<Vec<u8>>) -> Self {
    let mut buf = source.into();
    buf.push(0);
    Self {
      buf,
      pos: 0,
      start: 0,
      err: None,
    }
  }

  /// Read the reader to completion. A read failure is latched and reported by
  /// [`ByteScanner::err`] for as long as the scanner lives; the scanner then
  /// behaves as if the input were empty.
  pub fn from_reader<R: Read>(mut reader: R) -> Self {
    let mut source = Vec::new();
    match reader.read_to_end(&mut source) {
      Ok(n) => {
        debug!(bytes = n, "read source");
        Self::new(source)
      }
      Err(err) => {
        debug!(error = %err, "source read failed");
        let mut scanner = Self::new(Vec::new());
        scanner.err = Some(Arc::new(err));
        scanner
      }
    }
  }

  pub fn err(&self) -> Option<&Arc<io::Error>> {
    self.err.as_ref()
  }

  /// Position of the sentinel, i.e. the input length.
  fn end(&self) -> usize {
    self.buf.len() - 1
  }

  pub fn is_eof(&self) -> bool {
    self.pos >= self.end()
  }

  /// Byte at `cursor + offset`; `0` at and beyond the sentinel.
  pub fn peek(&self, offset: usize) -> u8 {
    self.buf.get(self.pos + offset).copied().unwrap_or(0)
  }

  /// Decode the UTF-8 sequence starting at `cursor + offset`.
  ///
  /// The width comes from the leading byte. A stray continuation byte, an
  /// invalid lead byte, a sequence truncated by the end of input or one whose
  /// follow bytes are not continuation bytes yields the replacement character
  /// with width 1, so the next byte is never swallowed.
  pub fn peek_rune(&self, offset: usize) -> (char, usize) {
    let at = self.pos + offset;
    let c = self.peek(offset);
    let width = match c {
      0x00..=0x7F => return (char::from(c), 1),
      0xC0..=0xDF => 2,
      0xE0..=0xEF => 3,
      0xF0..=0xF7 => 4,
      _ => return (char::REPLACEMENT_CHARACTER, 1),
    };
    if at + width > self.end() {
      return (char::REPLACEMENT_CHARACTER, 1);
    }
    if self.buf[at + 1..at + width].iter().any(|&b| b & 0xC0 != 0x80) {
      return (char::REPLACEMENT_CHARACTER, 1);
    }

    let lead = match width {
      2 => u32::from(c & 0x1F),
      3 => u32::from(c & 0x0F),
      _ => u32::from(c & 0x07),
    };
    let code = self.buf[at + 1..at + width]
      .iter()
      .fold(lead, |acc, &b| (acc << 6) | u32::from(b & 0x3F));
    let rune = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
    (rune, width)
  }

  /// Move the cursor forward, never past the sentinel.
  pub fn advance(&mut self, n: usize) {
    self.pos = (self.pos + n).min(self.end());
  }

  /// Cursor position as a byte offset into the input.
  pub fn offset(&self) -> usize {
    self.pos
  }

  /// Offset where the pending lexeme starts.
  pub fn mark(&self) -> usize {
    self.start
  }

  pub fn mark_start(&mut self) {
    self.start = self.pos;
  }

  pub fn lexeme(&self) -> &[u8] {
    &self.buf[self.start..self.pos]
  }

  /// Take the bytes consumed since the last mark and start a new lexeme.
  pub fn extract_since_mark(&mut self) -> Vec<u8> {
    let raw = self.buf[self.start..self.pos].to_vec();
    self.start = self.pos;
    raw
  }

  /// The input without the sentinel.
  pub fn bytes(&self) -> &[u8] {
    &self.buf[..self.end()]
  }
}
