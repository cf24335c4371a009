//! Recursive-descent parser producing the syntax tree.
//!
//! Statements are parsed by plain recursive descent; expressions by
//! precedence climbing, one helper per tier, each delegating tighter-binding
//! operators to the tier below:
//!
//! ```text
//! assignment  := identifier ("=" | "+=" | "-=" | "*=" | "/=") assignment | logical_or
//! logical_or  := logical_and { "||" logical_and }
//! logical_and := equality { "&&" equality }
//! equality    := relational { ("==" | "!=") relational }
//! relational  := additive { ("<" | ">" | "<=" | ">=") additive }
//! additive    := term { ("+" | "-") term }
//! term        := factor { ("*" | "/" | "%") factor }
//! factor      := "(" assignment ")" | unary_op factor | integer | identifier
//! ```
//!
//! Tokens are pulled from the lexer on demand with a single token of
//! pushback. The first unexpected token aborts the parse.

use std::sync::Arc;

use snafu::IntoError;
use tracing::debug;

use crate::ast::{AssignOp, InfixOp, Node, PrefixOp};
use crate::error::{CompileError, CompileResult, ScanSnafu, SyntaxSnafu};
use crate::tokenizer::{Lexer, Token, TokenKind};
use crate::ty::TypeName;

/// Words that can never name a variable or function.
const RESERVED: [&str; 4] = ["int", "if", "else", "return"];

/// Parse a whole program from the lexer.
pub fn parse(lexer: Lexer) -> CompileResult<Node> {
  Parser::new(lexer).parse_program()
}

pub struct Parser {
  lexer: Lexer,
  pending: Option<Token>,
}

impl Parser {
  pub fn new(lexer: Lexer) -> Self {
    Self {
      lexer,
      pending: None,
    }
  }

  /// Parse top-level functions until the input ends or a token that is not a
  /// type keyword shows up; anything after that token is ignored.
  pub fn parse_program(&mut self) -> CompileResult<Node> {
    let mut functions = Vec::new();
    while let Some(token) = self.peek()? {
      if type_keyword(token).is_none() {
        debug!(
          offset = token.offset,
          text = %token.text(),
          "stopping at non-type token"
        );
        break;
      }
      functions.push(self.parse_function()?);
    }
    debug!(functions = functions.len(), "parsed program");
    Ok(Node::Program { functions })
  }

  // function := type_name identifier "(" ")" block
  fn parse_function(&mut self) -> CompileResult<Node> {
    let return_type = self.expect_type()?;
    let name = self.expect_ident()?;
    self.skip("(")?;
    self.skip(")")?;
    let body = self.parse_block()?;
    Ok(Node::FunctionDecl {
      name,
      params: Vec::new(),
      return_type,
      body: Box::new(body),
    })
  }

  // block := "{" { block_item } "}"
  fn parse_block(&mut self) -> CompileResult<Node> {
    self.skip("{")?;
    let mut statements = Vec::new();
    loop {
      if self.equal("}")? {
        break;
      }
      if self.peek()?.is_none() {
        return Err(self.expected("}"));
      }
      statements.push(self.parse_block_item()?);
    }
    Ok(Node::block(statements))
  }

  fn parse_block_item(&mut self) -> CompileResult<Node> {
    if self.peek()?.and_then(type_keyword).is_some() {
      self.parse_declaration()
    } else {
      self.parse_statement()
    }
  }

  // decl_statement := type_name identifier [ "=" assignment ] ";"
  fn parse_declaration(&mut self) -> CompileResult<Node> {
    let ty = self.expect_type()?;
    let name = self.expect_ident()?;
    let init = if self.equal("=")? {
      Some(Box::new(self.parse_assignment()?))
    } else {
      None
    };
    self.skip(";")?;
    Ok(Node::VarDecl { ty, name, init })
  }

  fn parse_statement(&mut self) -> CompileResult<Node> {
    if self.peek()?.is_some_and(|t| t.is("{")) {
      return self.parse_block();
    }
    if self.equal("if")? {
      return self.parse_if();
    }
    if self.equal("return")? {
      let value = self.parse_assignment()?;
      self.skip(";")?;
      return Ok(Node::ReturnStatement {
        value: Box::new(value),
      });
    }

    let expression = self.parse_assignment()?;
    self.skip(";")?;
    Ok(Node::ExpressionStatement {
      expression: Box::new(expression),
    })
  }

  // "if" "(" assignment ")" statement [ "else" statement ]
  //
  // The else is claimed greedily right after the then-branch, which binds a
  // dangling else to the innermost if.
  fn parse_if(&mut self) -> CompileResult<Node> {
    self.skip("(")?;
    let condition = self.parse_assignment()?;
    self.skip(")")?;
    let then = self.parse_statement()?;
    let otherwise = if self.equal("else")? {
      Some(Box::new(self.parse_statement()?))
    } else {
      None
    };
    Ok(Node::IfStatement {
      condition: Box::new(condition),
      then: Box::new(then),
      otherwise,
    })
  }

  pub fn parse_assignment(&mut self) -> CompileResult<Node> {
    let starts_with_ident = self.peek()?.is_some_and(|t| t.kind == TokenKind::Identifier);
    let node = self.parse_logical_or()?;

    // Only a bare identifier can be assigned to. Anything else leaves the
    // operator for the caller to reject.
    match node {
      Node::Identifier { name } if starts_with_ident => {
        let Some(op) = self.peek_assign_op()? else {
          return Ok(Node::Identifier { name });
        };
        self.pending = None;
        let value = self.parse_assignment()?;
        Ok(Node::assign(op, name, value))
      }
      node => Ok(node),
    }
  }

  fn parse_logical_or(&mut self) -> CompileResult<Node> {
    self.parse_left_assoc(&[InfixOp::Or], Self::parse_logical_and)
  }

  fn parse_logical_and(&mut self) -> CompileResult<Node> {
    self.parse_left_assoc(&[InfixOp::And], Self::parse_equality)
  }

  fn parse_equality(&mut self) -> CompileResult<Node> {
    self.parse_left_assoc(&[InfixOp::Eq, InfixOp::Ne], Self::parse_relational)
  }

  fn parse_relational(&mut self) -> CompileResult<Node> {
    self.parse_left_assoc(
      &[InfixOp::Lt, InfixOp::Gt, InfixOp::Le, InfixOp::Ge],
      Self::parse_additive,
    )
  }

  fn parse_additive(&mut self) -> CompileResult<Node> {
    self.parse_left_assoc(&[InfixOp::Add, InfixOp::Sub], Self::parse_term)
  }

  fn parse_term(&mut self) -> CompileResult<Node> {
    self.parse_left_assoc(
      &[InfixOp::Mul, InfixOp::Div, InfixOp::Mod],
      Self::parse_factor,
    )
  }

  /// One precedence tier: `operand { op operand }`, folding to the left.
  fn parse_left_assoc(
    &mut self,
    ops: &[InfixOp],
    operand: fn(&mut Self) -> CompileResult<Node>,
  ) -> CompileResult<Node> {
    let mut node = operand(self)?;
    while let Some(op) = self.peek_infix_op(ops)? {
      self.pending = None;
      let rhs = operand(self)?;
      node = Node::infix(op, node, rhs);
    }
    Ok(node)
  }

  fn parse_factor(&mut self) -> CompileResult<Node> {
    let Some(token) = self.next_token()? else {
      return Err(self.expected("expression"));
    };

    if let Some(op) = prefix_op(&token) {
      let operand = self.parse_factor()?;
      return Ok(Node::prefix(op, operand));
    }

    match token.kind {
      TokenKind::Punctuator if token.is("(") => {
        let node = self.parse_assignment()?;
        self.skip(")")?;
        Ok(node)
      }
      TokenKind::Numeric => Ok(Node::int(token.text())),
      TokenKind::Identifier if !is_reserved(&token) => Ok(Node::ident(token.text())),
      _ => {
        self.pending = Some(token);
        Err(self.expected("expression"))
      }
    }
  }

  /// Next significant token, skipping whitespace and line terminators.
  fn next_token(&mut self) -> CompileResult<Option<Token>> {
    if let Some(token) = self.pending.take() {
      return Ok(Some(token));
    }
    while let Some(token) = self.lexer.next() {
      if token.kind == TokenKind::Error {
        let source = self
          .lexer
          .scanner()
          .err()
          .map(Arc::clone)
          .unwrap_or_else(|| Arc::new(std::io::Error::other("unreadable source")));
        return Err(ScanSnafu.into_error(source));
      }
      if !token.is_trivia() {
        return Ok(Some(token));
      }
    }
    Ok(None)
  }

  fn peek(&mut self) -> CompileResult<Option<&Token>> {
    if self.pending.is_none() {
      self.pending = self.next_token()?;
    }
    Ok(self.pending.as_ref())
  }

  /// Consume the next token if its text is exactly `s`.
  fn equal(&mut self, s: &str) -> CompileResult<bool> {
    if self.peek()?.is_some_and(|t| t.is(s)) {
      self.pending = None;
      return Ok(true);
    }
    Ok(false)
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s)? {
      Ok(())
    } else {
      Err(self.expected(s))
    }
  }

  fn expect_ident(&mut self) -> CompileResult<String> {
    match self.peek()? {
      Some(token) if token.kind == TokenKind::Identifier && !is_reserved(token) => {
        let name = token.text().into_owned();
        self.pending = None;
        Ok(name)
      }
      _ => Err(self.expected("identifier")),
    }
  }

  fn expect_type(&mut self) -> CompileResult<TypeName> {
    match self.peek()?.and_then(type_keyword) {
      Some(ty) => {
        self.pending = None;
        Ok(ty)
      }
      None => Err(self.expected("type name")),
    }
  }

  fn peek_infix_op(&mut self, ops: &[InfixOp]) -> CompileResult<Option<InfixOp>> {
    Ok(
      self
        .peek()?
        .filter(|t| t.kind == TokenKind::Punctuator)
        .and_then(|t| InfixOp::from_symbol(&t.text()))
        .filter(|op| ops.contains(op)),
    )
  }

  fn peek_assign_op(&mut self) -> CompileResult<Option<AssignOp>> {
    Ok(
      self
        .peek()?
        .filter(|t| t.kind == TokenKind::Punctuator)
        .and_then(|t| AssignOp::from_symbol(&t.text())),
    )
  }

  /// Syntax error describing the pending token, or `EOF` when input is
  /// exhausted.
  fn expected(&mut self, what: &str) -> CompileError {
    let eof = self.lexer.scanner().bytes().len();
    match self.peek() {
      Ok(Some(token)) => SyntaxSnafu {
        expected: what,
        found: token.text(),
        offset: token.offset,
      }
      .build(),
      Ok(None) => SyntaxSnafu {
        expected: what,
        found: "EOF",
        offset: eof,
      }
      .build(),
      Err(err) => err,
    }
  }
}

fn type_keyword(token: &Token) -> Option<TypeName> {
  if token.kind != TokenKind::Identifier {
    return None;
  }
  TypeName::from_keyword(&token.raw)
}

fn prefix_op(token: &Token) -> Option<PrefixOp> {
  if token.kind != TokenKind::Punctuator {
    return None;
  }
  PrefixOp::from_symbol(&token.text())
}

fn is_reserved(token: &Token) -> bool {
  RESERVED.iter().any(|word| token.raw == word.as_bytes())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse_str(source: &str) -> CompileResult<Node> {
    parse(Lexer::new(source))
  }

  fn parse_expr(source: &str) -> Node {
    Parser::new(Lexer::new(source)).parse_assignment().unwrap()
  }

  fn body(program: &Node) -> &[Node] {
    let Node::Program { functions } = program else {
      panic!("not a program: {program:?}");
    };
    let Node::FunctionDecl { body, .. } = &functions[0] else {
      panic!("not a function");
    };
    let Node::Block { statements } = body.as_ref() else {
      panic!("body is not a block");
    };
    statements
  }

  fn syntax_error(source: &str) -> (String, String) {
    match parse_str(source) {
      Err(CompileError::Syntax {
        expected, found, ..
      }) => (expected, found),
      other => panic!("expected a syntax error, got {other:?}"),
    }
  }

  #[test]
  fn multiplication_binds_tighter_than_addition() {
    assert_eq!(
      parse_expr("2 + 3 * 4"),
      Node::infix(
        InfixOp::Add,
        Node::int("2"),
        Node::infix(InfixOp::Mul, Node::int("3"), Node::int("4")),
      )
    );
  }

  #[test]
  fn binary_operators_are_left_associative() {
    assert_eq!(
      parse_expr("8 - 4 - 2"),
      Node::infix(
        InfixOp::Sub,
        Node::infix(InfixOp::Sub, Node::int("8"), Node::int("4")),
        Node::int("2"),
      )
    );
  }

  #[test]
  fn precedence_tiers_nest_in_order() {
    assert_eq!(
      parse_expr("a || b && c == d < e"),
      Node::infix(
        InfixOp::Or,
        Node::ident("a"),
        Node::infix(
          InfixOp::And,
          Node::ident("b"),
          Node::infix(
            InfixOp::Eq,
            Node::ident("c"),
            Node::infix(InfixOp::Lt, Node::ident("d"), Node::ident("e")),
          ),
        ),
      )
    );
  }

  #[test]
  fn assignment_is_right_associative() {
    assert_eq!(
      parse_expr("a = b += 1"),
      Node::assign(
        AssignOp::Assign,
        "a",
        Node::assign(AssignOp::Add, "b", Node::int("1")),
      )
    );
  }

  #[test]
  fn unary_operators_and_parentheses() {
    assert_eq!(
      parse_expr("-(1 + 2) * !~x"),
      Node::infix(
        InfixOp::Mul,
        Node::prefix(
          PrefixOp::Neg,
          Node::infix(InfixOp::Add, Node::int("1"), Node::int("2")),
        ),
        Node::prefix(PrefixOp::Not, Node::prefix(PrefixOp::BitNot, Node::ident("x"))),
      )
    );
  }

  #[test]
  fn parses_function_with_declarations() {
    let program = parse_str("int main() {\n  int x = 5;\n  int y;\n  x += 3;\n  return x;\n}\n").unwrap();
    let Node::Program { functions } = &program else {
      unreachable!()
    };
    let Node::FunctionDecl {
      name,
      params,
      return_type,
      ..
    } = &functions[0]
    else {
      panic!("not a function");
    };
    assert_eq!(name, "main");
    assert!(params.is_empty());
    assert_eq!(*return_type, TypeName::Int);

    let statements = body(&program);
    assert_eq!(statements.len(), 4);
    assert_eq!(
      statements[0],
      Node::VarDecl {
        ty: TypeName::Int,
        name: "x".into(),
        init: Some(Box::new(Node::int("5"))),
      }
    );
    assert_eq!(
      statements[1],
      Node::VarDecl {
        ty: TypeName::Int,
        name: "y".into(),
        init: None,
      }
    );
    assert_eq!(
      statements[2],
      Node::ExpressionStatement {
        expression: Box::new(Node::assign(AssignOp::Add, "x", Node::int("3"))),
      }
    );
    assert_eq!(
      statements[3],
      Node::ReturnStatement {
        value: Box::new(Node::ident("x")),
      }
    );
  }

  #[test]
  fn dangling_else_binds_to_inner_if() {
    let program = parse_str("int main() { if (a) if (b) return 1; else return 2; }").unwrap();
    let Node::IfStatement {
      then, otherwise, ..
    } = &body(&program)[0]
    else {
      panic!("not an if");
    };
    assert!(otherwise.is_none());
    let Node::IfStatement { otherwise, .. } = then.as_ref() else {
      panic!("inner statement is not an if");
    };
    assert!(otherwise.is_some());
  }

  #[test]
  fn nested_blocks() {
    let program = parse_str("int main() { { int a; { a = 1; } } return 0; }").unwrap();
    let statements = body(&program);
    assert!(matches!(&statements[0], Node::Block { statements } if statements.len() == 2));
  }

  #[test]
  fn several_functions() {
    let program = parse_str("int one() { return 1; } int two() { return 2; }").unwrap();
    assert!(matches!(program, Node::Program { functions } if functions.len() == 2));
  }

  #[test]
  fn stops_at_first_non_type_token() {
    let program = parse_str("int main() { return 0; } garbage ( ) {").unwrap();
    assert!(matches!(program, Node::Program { functions } if functions.len() == 1));
    let empty = parse_str("  \n").unwrap();
    assert_eq!(empty, Node::Program { functions: vec![] });
  }

  #[test]
  fn reports_expected_and_found() {
    assert_eq!(
      syntax_error("int main() { return 1 }"),
      (";".into(), "}".into())
    );
    assert_eq!(
      syntax_error("int main( { }"),
      (")".into(), "{".into())
    );
    assert_eq!(
      syntax_error("int main() { return 1;"),
      ("}".into(), "EOF".into())
    );
    assert_eq!(
      syntax_error("int main() { return @; }"),
      ("expression".into(), "@".into())
    );
  }

  #[test]
  fn error_offset_points_at_token() {
    let err = parse_str("int main() { return 1 }").unwrap_err();
    assert_eq!(err.offset(), Some(22));
  }

  #[test]
  fn assignment_requires_bare_identifier() {
    assert_eq!(
      syntax_error("int main() { 1 = 2; }"),
      (";".into(), "=".into())
    );
    assert_eq!(
      syntax_error("int main() { (x) = 2; }"),
      (";".into(), "=".into())
    );
  }

  #[test]
  fn reserved_words_are_not_identifiers() {
    assert_eq!(
      syntax_error("int main() { int return = 1; }"),
      ("identifier".into(), "return".into())
    );
    assert_eq!(
      syntax_error("int int() { return 0; }"),
      ("identifier".into(), "int".into())
    );
  }

  #[test]
  fn read_failure_surfaces_as_scan_error() {
    struct Broken;
    impl std::io::Read for Broken {
      fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("gone"))
      }
    }
    let err = parse(Lexer::from_reader(Broken)).unwrap_err();
    assert!(matches!(err, CompileError::Scan { .. }));
  }
}
