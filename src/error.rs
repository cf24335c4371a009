//! Shared error type for every stage of the pipeline.
//!
//! Compilation is fail-fast: the first error raised by the scanner, parser or
//! generator is returned to the caller and nothing else is produced. Errors
//! that know where they happened can render a chibicc-style caret diagnostic
//! against the original source.

use std::{io, sync::Arc};

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  /// The underlying reader failed; the scanner latches the error.
  #[snafu(display("failed to read source: {source}"))]
  Scan { source: Arc<io::Error> },

  #[snafu(display("expected \"{expected}\", but got \"{found}\""))]
  Syntax {
    expected: String,
    found: String,
    offset: usize,
  },

  #[snafu(display("{source}"))]
  Semantic { source: SemanticError },

  #[snafu(display("cannot lower {node} in this position"))]
  UnsupportedNode { node: String },
}

/// Name and value checks that fail while lowering a function.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SemanticError {
  #[snafu(display("undeclared variable '{name}'"))]
  UndeclaredVariable { name: String },

  #[snafu(display("variable '{name}' is already declared in this function"))]
  DuplicateDeclaration { name: String },

  #[snafu(display("integer literal {literal} does not fit in 64 bits"))]
  LiteralOutOfRange { literal: String },
}

impl CompileError {
  /// Byte offset into the source, for errors that carry one.
  pub fn offset(&self) -> Option<usize> {
    match self {
      Self::Syntax { offset, .. } => Some(*offset),
      _ => None,
    }
  }

  /// Render the error against `source`, pointing at the offending byte with a
  /// caret when the error has a location.
  pub fn diagnostic(&self, source: &[u8]) -> String {
    let Some(loc) = self.offset() else {
      return self.to_string();
    };
    let loc = loc.min(source.len());
    let line_start = source[..loc]
      .iter()
      .rposition(|&b| b == b'\n')
      .map_or(0, |i| i + 1);
    let line_end = source[loc..]
      .iter()
      .position(|&b| b == b'\n' || b == b'\r')
      .map_or(source.len(), |i| loc + i);
    let line_no = source[..line_start].iter().filter(|&&b| b == b'\n').count() + 1;

    let line = String::from_utf8_lossy(&source[line_start..line_end]);
    let column = String::from_utf8_lossy(&source[line_start..loc]).chars().count();
    let marker = format!("{}^", " ".repeat(column));
    format!("line {line_no}: {self}\n{line}\n{marker}")
  }
}
