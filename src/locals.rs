//! Frame-pointer-relative slots for a function's local variables.
//!
//! Slots are handed out in declaration order, the first at `-8(%rbp)`, each
//! following one a slot-size lower. The table is flat: one per function, no
//! shadowing between nested blocks.

use std::collections::HashMap;

use snafu::ResultExt;

use crate::error::{
  CompileResult, DuplicateDeclarationSnafu, SemanticSnafu, UndeclaredVariableSnafu,
};
use crate::ty::TypeName;

#[derive(Debug, Default)]
pub struct VariableTable {
  slots: HashMap<String, i64>,
  used: i64,
}

impl VariableTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Reserve the next slot for `name` and return its offset.
  pub fn declare(&mut self, name: &str, ty: TypeName) -> CompileResult<i64> {
    if self.slots.contains_key(name) {
      return DuplicateDeclarationSnafu { name }.fail().context(SemanticSnafu);
    }
    self.used += ty.size();
    let offset = -self.used;
    self.slots.insert(name.to_string(), offset);
    Ok(offset)
  }

  pub fn lookup(&self, name: &str) -> CompileResult<i64> {
    match self.slots.get(name) {
      Some(&offset) => Ok(offset),
      None => UndeclaredVariableSnafu { name }.fail().context(SemanticSnafu),
    }
  }
}
