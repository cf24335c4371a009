//! Syntax tree shared by the parser (construction) and the code generator
//! (lowering).
//!
//! Every node kind is a variant of the single closed [`Node`] enum, so both
//! dispatchers match exhaustively. Nodes are built once and never mutated.
//! The tree serialises to JSON for `print-ast`.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::ty::TypeName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
  Neg,
  Not,
  BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  And,
  Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
  Assign,
  Add,
  Sub,
  Mul,
  Div,
}

impl PrefixOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    match symbol {
      "-" => Some(Self::Neg),
      "!" => Some(Self::Not),
      "~" => Some(Self::BitNot),
      _ => None,
    }
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Neg => "-",
      Self::Not => "!",
      Self::BitNot => "~",
    }
  }
}

impl InfixOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    let op = match symbol {
      "+" => Self::Add,
      "-" => Self::Sub,
      "*" => Self::Mul,
      "/" => Self::Div,
      "%" => Self::Mod,
      "==" => Self::Eq,
      "!=" => Self::Ne,
      "<" => Self::Lt,
      "<=" => Self::Le,
      ">" => Self::Gt,
      ">=" => Self::Ge,
      "&&" => Self::And,
      "||" => Self::Or,
      _ => return None,
    };
    Some(op)
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Mod => "%",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::Lt => "<",
      Self::Le => "<=",
      Self::Gt => ">",
      Self::Ge => ">=",
      Self::And => "&&",
      Self::Or => "||",
    }
  }
}

impl AssignOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    match symbol {
      "=" => Some(Self::Assign),
      "+=" => Some(Self::Add),
      "-=" => Some(Self::Sub),
      "*=" => Some(Self::Mul),
      "/=" => Some(Self::Div),
      _ => None,
    }
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Assign => "=",
      Self::Add => "+=",
      Self::Sub => "-=",
      Self::Mul => "*=",
      Self::Div => "/=",
    }
  }

  /// The arithmetic a compound assignment performs, `None` for plain `=`.
  pub fn arithmetic(self) -> Option<InfixOp> {
    match self {
      Self::Assign => None,
      Self::Add => Some(InfixOp::Add),
      Self::Sub => Some(InfixOp::Sub),
      Self::Mul => Some(InfixOp::Mul),
      Self::Div => Some(InfixOp::Div),
    }
  }
}

macro_rules! symbol_impls {
  ($($ty:ty),*) => {$(
    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
      }
    }

    impl Serialize for $ty {
      fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
      }
    }
  )*};
}

symbol_impls!(PrefixOp, InfixOp, AssignOp);

/// A formal parameter. The grammar never produces one yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
  pub name: String,
  #[serde(rename = "type")]
  pub ty: TypeName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Node {
  Program {
    functions: Vec<Node>,
  },
  FunctionDecl {
    name: String,
    params: Vec<Param>,
    #[serde(rename = "return")]
    return_type: TypeName,
    body: Box<Node>,
  },
  Block {
    statements: Vec<Node>,
  },
  VarDecl {
    #[serde(rename = "type")]
    ty: TypeName,
    name: String,
    init: Option<Box<Node>>,
  },
  ExpressionStatement {
    expression: Box<Node>,
  },
  ReturnStatement {
    value: Box<Node>,
  },
  IfStatement {
    condition: Box<Node>,
    then: Box<Node>,
    #[serde(rename = "else")]
    otherwise: Option<Box<Node>>,
  },
  Identifier {
    name: String,
  },
  IntegerLiteral {
    value: String,
  },
  PrefixExpression {
    op: PrefixOp,
    operand: Box<Node>,
  },
  InfixExpression {
    op: InfixOp,
    lhs: Box<Node>,
    rhs: Box<Node>,
  },
  AssignExpression {
    op: AssignOp,
    target: String,
    value: Box<Node>,
  },
}

impl Node {
  pub fn ident(name: impl Into<String>) -> Self {
    Self::Identifier { name: name.into() }
  }

  pub fn int(value: impl Into<String>) -> Self {
    Self::IntegerLiteral {
      value: value.into(),
    }
  }

  pub fn prefix(op: PrefixOp, operand: Node) -> Self {
    Self::PrefixExpression {
      op,
      operand: Box::new(operand),
    }
  }

  pub fn infix(op: InfixOp, lhs: Node, rhs: Node) -> Self {
    Self::InfixExpression {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(op: AssignOp, target: impl Into<String>, value: Node) -> Self {
    Self::AssignExpression {
      op,
      target: target.into(),
      value: Box::new(value),
    }
  }

  pub fn block(statements: Vec<Node>) -> Self {
    Self::Block { statements }
  }

  /// Variant name, used in diagnostics.
  pub fn kind_name(&self) -> &'static str {
    match self {
      Self::Program { .. } => "Program",
      Self::FunctionDecl { .. } => "FunctionDecl",
      Self::Block { .. } => "Block",
      Self::VarDecl { .. } => "VarDecl",
      Self::ExpressionStatement { .. } => "ExpressionStatement",
      Self::ReturnStatement { .. } => "ReturnStatement",
      Self::IfStatement { .. } => "IfStatement",
      Self::Identifier { .. } => "Identifier",
      Self::IntegerLiteral { .. } => "IntegerLiteral",
      Self::PrefixExpression { .. } => "PrefixExpression",
      Self::InfixExpression { .. } => "InfixExpression",
      Self::AssignExpression { .. } => "AssignExpression",
    }
  }
}
