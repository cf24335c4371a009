//! Lexical analysis: classifies runs of source bytes into tokens.
//!
//! The lexer is pull-based: every call to `Lexer::next` produces exactly one
//! token, whitespace and line terminators included, so concatenating the raw
//! bytes of every token reproduces the input. Alongside it keeps a stack of
//! bracket contexts and a mode describing what kind of token is expected
//! next. Operators are matched longest-first so `<=` is one token, not two.

use std::{borrow::Cow, fmt, io::Read};

use tracing::trace;

use crate::scanner::ByteScanner;

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  /// The scanner could not read its input.
  Error,
  Unknown,
  Identifier,
  Numeric,
  Punctuator,
  Whitespace,
  LineTerminator,
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Error => "Error",
      Self::Unknown => "Unknown",
      Self::Identifier => "Identifier",
      Self::Numeric => "Numeric",
      Self::Punctuator => "Punctuator",
      Self::Whitespace => "Whitespace",
      Self::LineTerminator => "LineTerminator",
    };
    f.write_str(name)
  }
}

/// What the lexer expects to see next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
  Expression,
  StatementParens,
  Subscript,
  PropertyName,
}

/// Bracket nesting kinds tracked on the context stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexContext {
  Global,
  StatementParens,
  ExpressionParens,
  Braces,
  Template,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub raw: Vec<u8>,
  /// Byte offset of the first byte of `raw` in the source.
  pub offset: usize,
}

impl Token {
  pub fn text(&self) -> Cow<'_, str> {
    String::from_utf8_lossy(&self.raw)
  }

  /// True for a punctuator or identifier whose text is exactly `s`.
  pub fn is(&self, s: &str) -> bool {
    matches!(self.kind, TokenKind::Punctuator | TokenKind::Identifier) && self.raw == s.as_bytes()
  }

  /// Whitespace and line terminators carry no syntax.
  pub fn is_trivia(&self) -> bool {
    matches!(self.kind, TokenKind::Whitespace | TokenKind::LineTerminator)
  }
}

/// Multi-byte operators, longest first within each leading byte.
const COMPOUND_OPERATORS: [&[u8]; 10] = [
  b"==", b"!=", b"<=", b">=", b"&&", b"||", b"+=", b"-=", b"*=", b"/=",
];

/// Keywords after which a `(` opens statement parentheses.
const STATEMENT_KEYWORDS: [&[u8]; 1] = [b"if"];

pub struct Lexer {
  scanner: ByteScanner,
  stack: Vec<LexContext>,
  mode: LexMode,
}

impl Lexer {
  pub fn new(source: impl Into<Vec<u8>>) -> Self {
    Self::with_scanner(ByteScanner::new(source))
  }

  pub fn from_reader<R: Read>(reader: R) -> Self {
    Self::with_scanner(ByteScanner::from_reader(reader))
  }

  fn with_scanner(scanner: ByteScanner) -> Self {
    Self {
      scanner,
      stack: Vec::with_capacity(16),
      mode: LexMode::Expression,
    }
  }

  pub fn scanner(&self) -> &ByteScanner {
    &self.scanner
  }

  pub fn mode(&self) -> LexMode {
    self.mode
  }

  /// Innermost open context, `Global` at top level.
  pub fn context(&self) -> LexContext {
    self.stack.last().copied().unwrap_or(LexContext::Global)
  }

  pub fn depth(&self) -> usize {
    self.stack.len()
  }

  fn enter_context(&mut self, context: LexContext) {
    self.stack.push(context);
  }

  fn leave_context(&mut self) -> LexContext {
    self.stack.pop().unwrap_or(LexContext::Global)
  }

  /// Drain the remaining input into a vector.
  pub fn tokenize(&mut self) -> Vec<Token> {
    self.by_ref().take_while(|t| t.kind != TokenKind::Error).collect()
  }

  fn scan(&mut self) -> TokenKind {
    let c = self.scanner.peek(0);
    let kind = match c {
      b'(' => {
        if self.mode == LexMode::StatementParens {
          self.enter_context(LexContext::StatementParens);
        } else {
          self.enter_context(LexContext::ExpressionParens);
        }
        self.mode = LexMode::Expression;
        self.scanner.advance(1);
        TokenKind::Punctuator
      }
      b')' => {
        self.mode = if self.leave_context() == LexContext::StatementParens {
          LexMode::Expression
        } else {
          LexMode::Subscript
        };
        self.scanner.advance(1);
        TokenKind::Punctuator
      }
      b'{' => {
        self.enter_context(LexContext::Braces);
        self.mode = LexMode::Expression;
        self.scanner.advance(1);
        TokenKind::Punctuator
      }
      b'}' => {
        self.leave_context();
        self.mode = LexMode::Expression;
        self.scanner.advance(1);
        TokenKind::Punctuator
      }
      b']' => {
        self.mode = LexMode::Subscript;
        self.scanner.advance(1);
        TokenKind::Punctuator
      }
      b'[' | b';' | b',' | b'~' | b'?' | b':' => {
        self.mode = LexMode::Expression;
        self.scanner.advance(1);
        TokenKind::Punctuator
      }
      b'=' | b'!' | b'<' | b'>' | b'&' | b'|' | b'+' | b'-' | b'*' | b'/' | b'%' => {
        self.consume_operator();
        self.mode = LexMode::Expression;
        TokenKind::Punctuator
      }
      b'0'..=b'9' | b'.' => {
        if self.consume_numeric() {
          self.mode = LexMode::Subscript;
          TokenKind::Numeric
        } else {
          self.mode = LexMode::PropertyName;
          self.scanner.advance(1);
          TokenKind::Punctuator
        }
      }
      b' ' | b'\t' | 0x0B | 0x0C => {
        while self.consume_whitespace() {}
        TokenKind::Whitespace
      }
      b'\n' | b'\r' => {
        while self.consume_line_terminator() {}
        TokenKind::LineTerminator
      }
      _ => {
        if self.consume_identifier() {
          self.mode = if STATEMENT_KEYWORDS.contains(&self.scanner.lexeme()) {
            LexMode::StatementParens
          } else {
            LexMode::Subscript
          };
          TokenKind::Identifier
        } else if c >= 0xC0 && self.consume_whitespace() {
          while self.consume_whitespace() {}
          TokenKind::Whitespace
        } else if c >= 0xC0 && self.consume_line_terminator() {
          while self.consume_line_terminator() {}
          TokenKind::LineTerminator
        } else {
          TokenKind::Unknown
        }
      }
    };

    if kind == TokenKind::Unknown {
      let (_, width) = self.scanner.peek_rune(0);
      self.scanner.advance(width);
    }
    kind
  }

  fn consume_operator(&mut self) {
    let pair = [self.scanner.peek(0), self.scanner.peek(1)];
    if COMPOUND_OPERATORS.iter().any(|op| *op == &pair[..]) {
      self.scanner.advance(2);
    } else {
      self.scanner.advance(1);
    }
  }

  fn consume_numeric(&mut self) -> bool {
    if !self.scanner.peek(0).is_ascii_digit() {
      return false;
    }
    while self.scanner.peek(0).is_ascii_digit() {
      self.scanner.advance(1);
    }
    true
  }

  fn consume_whitespace(&mut self) -> bool {
    let c = self.scanner.peek(0);
    if matches!(c, b' ' | b'\t' | 0x0B | 0x0C) {
      self.scanner.advance(1);
      return true;
    }
    if c >= 0xC0 {
      let (rune, width) = self.scanner.peek_rune(0);
      if is_unicode_space(rune) {
        self.scanner.advance(width);
        return true;
      }
    }
    false
  }

  fn consume_line_terminator(&mut self) -> bool {
    match self.scanner.peek(0) {
      b'\n' => {
        self.scanner.advance(1);
        true
      }
      b'\r' => {
        let width = if self.scanner.peek(1) == b'\n' { 2 } else { 1 };
        self.scanner.advance(width);
        true
      }
      c if c >= 0xC0 => {
        let (rune, width) = self.scanner.peek_rune(0);
        if matches!(rune, '\u{2028}' | '\u{2029}') {
          self.scanner.advance(width);
          true
        } else {
          false
        }
      }
      _ => false,
    }
  }

  fn consume_identifier(&mut self) -> bool {
    let c = self.scanner.peek(0);
    if !(c.is_ascii_alphabetic() || c == b'$' || c == b'_') {
      return false;
    }
    self.scanner.advance(1);
    loop {
      let c = self.scanner.peek(0);
      if c.is_ascii_alphanumeric() || c == b'$' || c == b'_' {
        self.scanner.advance(1);
      } else {
        return true;
      }
    }
  }
}

/// Produces one token per call and `None` once the input is exhausted.
///
/// When the source could not be read every call yields an `Error` token.
impl Iterator for Lexer {
  type Item = Token;

  fn next(&mut self) -> Option<Token> {
    if self.scanner.err().is_some() {
      return Some(Token {
        kind: TokenKind::Error,
        raw: Vec::new(),
        offset: self.scanner.offset(),
      });
    }
    if self.scanner.is_eof() {
      return None;
    }

    self.scanner.mark_start();
    let kind = self.scan();
    let offset = self.scanner.mark();
    let raw = self.scanner.extract_since_mark();
    trace!(%kind, offset, text = %String::from_utf8_lossy(&raw), "token");
    Some(Token { kind, raw, offset })
  }
}

/// No-break space, byte order mark and the Zs category.
fn is_unicode_space(rune: char) -> bool {
  matches!(
    rune,
    '\u{00A0}'
      | '\u{FEFF}'
      | '\u{1680}'
      | '\u{2000}'..='\u{200A}'
      | '\u{202F}'
      | '\u{205F}'
      | '\u{3000}'
  )
}
