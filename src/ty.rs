use std::fmt;

use serde::Serialize;

/// Type names the language accepts in declarations and function headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeName {
  Int,
}

impl TypeName {
  pub fn from_keyword(word: &[u8]) -> Option<Self> {
    match word {
      b"int" => Some(Self::Int),
      _ => None,
    }
  }

  pub fn keyword(self) -> &'static str {
    match self {
      Self::Int => "int",
    }
  }

  /// Bytes a value of this type occupies in a stack slot.
  pub fn size(self) -> i64 {
    match self {
      Self::Int => 8,
    }
  }
}

impl fmt::Display for TypeName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.keyword())
  }
}
