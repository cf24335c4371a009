//! Crate root: wires together the compilation pipeline.
//!
//! The stages run one after another over the whole input:
//! - `scanner` holds the source bytes and a cursor with bounded lookahead.
//! - `tokenizer` classifies bytes into tokens, tracking bracket contexts.
//! - `parser` builds the `ast` with recursive descent and precedence climbing.
//! - `codegen` lowers the tree into column-aligned x86-64 AT&T assembly,
//!   using `labels` for jump targets and `locals` for stack slots.
//! - `error` holds the fail-fast error type shared by every stage.

pub mod ast;
pub mod error;
pub mod parser;
pub mod scanner;
pub mod tokenizer;
pub mod ty;

mod codegen;
mod emit;
mod labels;
mod locals;

use std::io::Read;

use tracing::debug;

pub use codegen::{CodegenOptions, generate};
pub use error::{CompileError, CompileResult, SemanticError};

use crate::ast::Node;
use crate::tokenizer::Lexer;

/// Read `reader` to the end and parse it into a syntax tree.
pub fn parse_source<R: Read>(reader: R) -> CompileResult<Node> {
  parser::parse(Lexer::from_reader(reader))
}

/// Run the whole pipeline over `reader`.
pub fn compile<R: Read>(reader: R, options: &CodegenOptions) -> CompileResult<String> {
  let program = parse_source(reader)?;
  let asm = generate(&program, options)?;
  debug!(bytes = asm.len(), "generated assembly");
  Ok(asm)
}

/// Compile a source string into AT&T assembly with default options.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  compile(source.as_bytes(), &CodegenOptions::default())
}

/// Pretty JSON dump of a syntax tree.
pub fn dump_ast(program: &Node) -> serde_json::Result<String> {
  serde_json::to_string_pretty(program)
}
